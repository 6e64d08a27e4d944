//! The CRUD surface shared by `Client`, `Connection` and transactions.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::diagnostics::{DiagnosticEvent, Instrumentation, QueryOutcome};
use crate::error::RdsError;
use crate::escape::{self, Dialect};
use crate::query_builder::{
    LockTableOption, SelectOptions, UpdateOptions, UpdateRow, Where, build_count_with,
    build_delete_with, build_insert_with, build_lock_tables, build_select_statement_with,
    build_unlock_tables, build_update_rows_with, build_update_with,
};
use crate::results::{ResultRow, ResultSet};
use crate::types::{Params, Row, SqlValue};

/// Anything that can run SQL.
///
/// Implementors provide [`execute`](Queryable::execute); every other method builds a
/// statement and routes it through [`query`](Queryable::query), which applies
/// hooks, logging, diagnostics and SQL annotation of failures.
#[async_trait]
pub trait Queryable: Send {
    /// Send already rendered SQL to the underlying connection.
    ///
    /// # Errors
    /// Returns the driver error, or `RdsError::TransactionFinalized` for a finished transaction.
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, RdsError>;

    fn instrumentation(&self) -> &Arc<Instrumentation>;

    /// Quoting rules of the backend statements are sent to.
    fn dialect(&self) -> Dialect;

    /// Id of the pooled connection queries currently go through, when one is held.
    fn connection_id(&self) -> Option<u64> {
        None
    }

    /// Render `sql` with `params` and run it.
    ///
    /// # Errors
    /// Driver failures are returned as `RdsError::Query` carrying the SQL that was sent.
    async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet, RdsError> {
        let instrumentation = Arc::clone(self.instrumentation());
        let sql = instrumentation.rewrite(self.dialect().format(sql, params));
        let connection_id = self.connection_id();

        tracing::debug!(?connection_id, %sql, "query start");
        instrumentation.publish(DiagnosticEvent::QueryStart {
            connection_id,
            sql: sql.clone(),
        });

        let started = Instant::now();
        let result = self.execute(&sql).await.map_err(|e| e.with_sql(&sql));
        let duration = started.elapsed();

        match &result {
            Ok(rs) => tracing::debug!(?connection_id, ?duration, rows = rs.affected_rows, "query end"),
            Err(e) => tracing::debug!(?connection_id, ?duration, error = %e, "query failed"),
        }
        instrumentation.publish(DiagnosticEvent::QueryEnd {
            connection_id,
            sql: sql.clone(),
            duration,
            error: result.as_ref().err().map(ToString::to_string),
        });
        instrumentation.after(&QueryOutcome {
            sql: &sql,
            result: result.as_ref().ok(),
            duration,
            error: result.as_ref().err(),
        });
        result
    }

    /// First row of [`query`](Queryable::query), if any.
    ///
    /// # Errors
    /// Same as [`query`](Queryable::query).
    async fn query_one(&mut self, sql: &str, params: &Params) -> Result<Option<ResultRow>, RdsError> {
        Ok(self.query(sql, params).await?.into_first())
    }

    /// # Errors
    /// Returns `RdsError::Statement` for an unbuildable filter, otherwise as [`query`](Queryable::query).
    async fn select(&mut self, table: &str, options: &SelectOptions) -> Result<ResultSet, RdsError> {
        let sql = build_select_statement_with(table, options, self.dialect())?;
        tracing::debug!(table, %sql, "select");
        self.query(&sql, &Params::None).await
    }

    /// First row of `select`, ignoring any limit or offset in `options`. A `filter` given
    /// here replaces the one in `options`.
    ///
    /// # Errors
    /// Same as [`select`](Queryable::select).
    async fn get(
        &mut self,
        table: &str,
        filter: Option<&Where>,
        options: &SelectOptions,
    ) -> Result<Option<ResultRow>, RdsError> {
        let mut options = options.clone();
        if let Some(filter) = filter {
            options.filter = Some(filter.clone());
        }
        options.limit = Some(1);
        options.offset = None;
        let sql = build_select_statement_with(table, &options, self.dialect())?;
        tracing::debug!(table, %sql, "get");
        Ok(self.query(&sql, &Params::None).await?.into_first())
    }

    /// # Errors
    /// Returns `RdsError::Statement` for an empty batch, otherwise as [`query`](Queryable::query).
    async fn insert(
        &mut self,
        table: &str,
        rows: &[Row],
        columns: Option<&[String]>,
    ) -> Result<ResultSet, RdsError> {
        let sql = build_insert_with(table, rows, columns, self.dialect())?;
        tracing::debug!(table, rows = rows.len(), %sql, "insert");
        self.query(&sql, &Params::None).await
    }

    /// # Errors
    /// Returns `RdsError::Statement` when no condition can be derived; nothing is sent.
    async fn update(
        &mut self,
        table: &str,
        row: &Row,
        options: &UpdateOptions,
    ) -> Result<ResultSet, RdsError> {
        let sql = build_update_with(table, row, options, self.dialect())?;
        tracing::debug!(table, %sql, "update");
        self.query(&sql, &Params::None).await
    }

    /// Update many rows with one CASE-based statement.
    ///
    /// # Errors
    /// Returns `RdsError::Statement` if any entry lacks a condition; nothing is sent.
    async fn update_rows(&mut self, table: &str, batch: &[UpdateRow]) -> Result<ResultSet, RdsError> {
        let sql = build_update_rows_with(table, batch, self.dialect())?;
        tracing::debug!(table, rows = batch.len(), %sql, "update rows");
        self.query(&sql, &Params::None).await
    }

    /// Delete matching rows; `None` deletes every row.
    ///
    /// # Errors
    /// Same as [`query`](Queryable::query).
    async fn delete(&mut self, table: &str, filter: Option<&Where>) -> Result<ResultSet, RdsError> {
        let sql = build_delete_with(table, filter, self.dialect())?;
        tracing::debug!(table, %sql, "delete");
        self.query(&sql, &Params::None).await
    }

    /// The `count` column of `SELECT COUNT(*) as count`, as an integer or integer text.
    ///
    /// # Errors
    /// Same as [`query`](Queryable::query), plus `RdsError::Driver` when the result has no
    /// row, no `count` column, or a count that is not an integer.
    async fn count(&mut self, table: &str, filter: Option<&Where>) -> Result<i64, RdsError> {
        let sql = build_count_with(table, filter, self.dialect())?;
        tracing::debug!(table, %sql, "count");
        let row = self.query(&sql, &Params::None).await?.into_first();
        match row.as_ref().and_then(|row| row.get("count")) {
            Some(SqlValue::Int(count)) => Ok(*count),
            Some(SqlValue::Text(text)) => text.trim().parse().map_err(|_| {
                RdsError::Driver(format!("count query returned a non-integer count `{text}`"))
            }),
            Some(other) => Err(RdsError::Driver(format!(
                "count query returned a non-integer count `{}`",
                other.to_plain_string()
            ))),
            None => Err(RdsError::Driver(
                "count query returned no count column".to_string(),
            )),
        }
    }

    /// # Errors
    /// Returns `RdsError::Statement` for an invalid lock list; nothing is sent.
    async fn locks(&mut self, tables: &[LockTableOption]) -> Result<ResultSet, RdsError> {
        let sql = build_lock_tables(tables)?;
        tracing::debug!(%sql, "lock tables");
        self.query(&sql, &Params::None).await
    }

    /// # Errors
    /// Same as [`locks`](Queryable::locks).
    async fn lock_one(
        &mut self,
        table: &str,
        lock_type: &str,
        alias: Option<&str>,
    ) -> Result<ResultSet, RdsError> {
        let mut option = LockTableOption::new(table, lock_type);
        if let Some(alias) = alias {
            option = option.alias(alias);
        }
        self.locks(std::slice::from_ref(&option)).await
    }

    /// # Errors
    /// Same as [`query`](Queryable::query).
    async fn unlock(&mut self) -> Result<ResultSet, RdsError> {
        self.query(&build_unlock_tables(), &Params::None).await
    }

    fn escape(&self, value: &SqlValue) -> String {
        self.dialect().escape_value(value)
    }

    fn escape_id(&self, name: &str) -> String {
        escape::escape_id(name)
    }

    fn format(&self, sql: &str, params: &Params) -> String {
        self.dialect().format(sql, params)
    }
}
