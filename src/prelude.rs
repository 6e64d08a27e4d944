//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::client::{Client, ClientBuilder, PoolStats};
pub use crate::config::PoolOptions;
pub use crate::connection::Connection;
pub use crate::diagnostics::{DiagnosticEvent, QueryOutcome};
pub use crate::driver::{Driver, DriverConnection};
pub use crate::error::RdsError;
pub use crate::escape::{Dialect, escape_id, escape_id_with, escape_value, format};
pub use crate::literal::Literal;
pub use crate::operator::Queryable;
pub use crate::query_builder::{
    CompareOp, Condition, Direction, LockTableOption, OrderBy, SelectOptions, UpdateOptions,
    UpdateRow, Where, build_where,
};
pub use crate::results::{ResultRow, ResultSet};
pub use crate::scope::TransactionContext;
pub use crate::transaction::{Transaction, TransactionHandle};
pub use crate::types::{Params, Row, SqlValue};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteManager;
