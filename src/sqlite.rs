//! Bundled `SQLite` driver.
//!
//! Each connection is a `rusqlite::Connection` behind a tokio mutex; statements
//! run on the blocking pool. Use a file path rather than `:memory:` when more
//! than one pooled connection must see the same data. String values are quoted
//! with [`Dialect::Ansi`]: `'` is doubled and backslash is an ordinary character.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::ManageConnection;
use rusqlite::types::ValueRef;
use tokio::sync::Mutex;

use crate::driver::DriverConnection;
use crate::error::RdsError;
use crate::escape::Dialect;
use crate::results::ResultSet;
use crate::types::SqlValue;

pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// bb8 manager for `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
    busy_timeout: Duration,
}

impl SqliteManager {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SqliteDriverConnection;
    type Error = RdsError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.db_path.clone();
        let timeout = self.busy_timeout;
        async move {
            let conn = tokio::task::spawn_blocking(move || {
                let conn = rusqlite::Connection::open(&path)?;
                conn.busy_timeout(timeout)?;
                conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
                Ok::<_, RdsError>(conn)
            })
            .await
            .map_err(|e| RdsError::GetConnection(format!("sqlite open join error: {e}")))??;
            Ok(SqliteDriverConnection {
                conn: Arc::new(Mutex::new(conn)),
            })
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.execute("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// One pooled `SQLite` connection.
pub struct SqliteDriverConnection {
    conn: SharedSqliteConnection,
}

impl fmt::Debug for SqliteDriverConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDriverConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl DriverConnection for SqliteDriverConnection {
    const DIALECT: Dialect = Dialect::Ansi;

    async fn execute(&mut self, sql: &str) -> Result<ResultSet, RdsError> {
        let sql = sql.to_owned();
        run_blocking(Arc::clone(&self.conn), move |conn| run_statement(conn, &sql)).await
    }
}

pub(crate) async fn run_blocking<F, R>(conn: SharedSqliteConnection, func: F) -> Result<R, RdsError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, RdsError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| RdsError::Driver(format!("sqlite spawn_blocking join error: {e}")))?
}

fn run_statement(conn: &mut rusqlite::Connection, sql: &str) -> Result<ResultSet, RdsError> {
    let mut stmt = conn.prepare(sql)?;
    let column_count = stmt.column_count();

    if column_count == 0 {
        let affected = stmt.execute([])?;
        drop(stmt);
        let insert_id = is_insert(sql).then(|| conn.last_insert_rowid());
        return Ok(ResultSet::from_write(affected, insert_id));
    }

    let column_names = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut result = ResultSet::with_columns(column_names);
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(sqlite_value(row.get_ref(idx)?));
        }
        result.add_row_values(values);
    }
    Ok(result)
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}

fn sqlite_value(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Int(i),
        ValueRef::Real(f) => SqlValue::Float(f),
        ValueRef::Text(bytes) => SqlValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    }
}
