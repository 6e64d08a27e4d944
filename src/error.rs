use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;

#[derive(Debug, Error)]
pub enum RdsError {
    /// Checking a connection out of the pool (or sending `BEGIN` on it) failed.
    #[error("Get connection error: {0}")]
    GetConnection(String),

    /// A caller-supplied descriptor could not be turned into SQL. Raised before
    /// anything is sent to the driver.
    #[error("Statement error: {0}")]
    Statement(String),

    /// A driver failure annotated with the SQL that caused it.
    #[error("{source}\n    sql: {sql}")]
    Query {
        sql: String,
        #[source]
        source: Box<RdsError>,
    },

    #[error("Driver error: {0}")]
    Driver(String),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("transaction was commit or rollback")]
    TransactionFinalized,

    /// Commit or rollback failed after the scope's work failed; `cause` is the work error.
    #[error("{error} (cause: {cause})")]
    Finalize {
        error: Box<RdsError>,
        #[source]
        cause: Box<RdsError>,
    },

    #[error("pool is closed")]
    PoolClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl RdsError {
    /// The underlying error with any `Query` annotations stripped.
    #[must_use]
    pub fn root(&self) -> &RdsError {
        match self {
            RdsError::Query { source, .. } => source.root(),
            other => other,
        }
    }

    /// The SQL text attached to this error, if it came from a query.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        match self {
            RdsError::Query { sql, .. } => Some(sql),
            _ => None,
        }
    }

    pub(crate) fn with_sql(self, sql: &str) -> Self {
        RdsError::Query {
            sql: sql.to_string(),
            source: Box::new(self),
        }
    }

    /// Pool checkout failures, including checkouts from an ended client.
    #[must_use]
    pub fn is_get_connection(&self) -> bool {
        matches!(self.root(), RdsError::GetConnection(_) | RdsError::PoolClosed)
    }

    #[must_use]
    pub fn is_transaction_finalized(&self) -> bool {
        matches!(self.root(), RdsError::TransactionFinalized)
    }
}

impl<E: std::fmt::Display> From<bb8::RunError<E>> for RdsError {
    fn from(err: bb8::RunError<E>) -> Self {
        #[allow(unreachable_patterns)]
        let detail = match err {
            bb8::RunError::User(e) => e.to_string(),
            bb8::RunError::TimedOut => "timed out waiting for a connection".to_string(),
            _ => "unknown pool error".to_string(),
        };
        RdsError::GetConnection(format!("pool checkout error: {detail}"))
    }
}
