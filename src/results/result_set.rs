use std::collections::HashMap;
use std::sync::Arc;

use super::row::{ResultRow, index_columns};
use crate::types::SqlValue;

/// What the driver returned for one statement.
///
/// Reads fill `rows`; writes fill `affected_rows` and, for inserts, `insert_id`.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub rows: Vec<ResultRow>,
    /// Rows changed by a write, or rows returned by a read
    pub affected_rows: usize,
    /// Last generated key after an insert
    pub insert_id: Option<i64>,
    column_names: Option<Arc<Vec<String>>>,
    column_index: Option<Arc<HashMap<String, usize>>>,
}

impl ResultSet {
    /// Empty result set for a read with the given column names.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            rows: Vec::new(),
            affected_rows: 0,
            insert_id: None,
            column_names: Some(Arc::new(column_names)),
            column_index: Some(column_index),
        }
    }

    /// Result of a write statement.
    #[must_use]
    pub fn from_write(affected_rows: usize, insert_id: Option<i64>) -> Self {
        Self {
            affected_rows,
            insert_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get_column_names(&self) -> Option<&Arc<Vec<String>>> {
        self.column_names.as_ref()
    }

    /// Append a row of values in column order.
    ///
    /// Rows added before any column names are set are ignored.
    pub fn add_row_values(&mut self, values: Vec<SqlValue>) {
        if let (Some(column_names), Some(column_index)) = (&self.column_names, &self.column_index)
        {
            self.rows.push(ResultRow {
                column_names: Arc::clone(column_names),
                values,
                column_index: Arc::clone(column_index),
            });
            self.affected_rows += 1;
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<&ResultRow> {
        self.rows.first()
    }

    /// Consume the set and keep only the first row.
    #[must_use]
    pub fn into_first(self) -> Option<ResultRow> {
        self.rows.into_iter().next()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
