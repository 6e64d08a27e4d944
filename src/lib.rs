//! Async MySQL-style operator layer over a pooled driver.
//!
//! Build statements from structured descriptors ([`Where`], [`SelectOptions`],
//! [`UpdateRow`], ...), run them through a [`Client`], a leased [`Connection`] or a
//! [`Transaction`], and compose units of work with nested transaction scopes that
//! share one transaction and commit exactly once.

pub mod client;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod escape;
pub mod literal;
pub mod operator;
pub mod prelude;
pub mod query_builder;
pub mod results;
pub mod scope;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod transaction;
pub mod types;

pub use client::{Client, ClientBuilder, PoolStats};
pub use config::PoolOptions;
pub use connection::Connection;
pub use diagnostics::{DiagnosticEvent, QueryOutcome};
pub use driver::{Driver, DriverConnection, InstrumentedManager, TrackedConnection};
pub use error::RdsError;
pub use escape::{Dialect, escape_id, escape_id_with, escape_value, format};
pub use literal::Literal;
pub use operator::Queryable;
pub use query_builder::{
    CompareOp, Condition, Direction, LockTableOption, OrderBy, SelectOptions, UpdateOptions,
    UpdateRow, Where,
};
pub use results::{ResultRow, ResultSet};
pub use scope::TransactionContext;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDriverConnection, SqliteManager};
pub use transaction::{Transaction, TransactionHandle};
pub use types::{Params, Row, SqlValue};
