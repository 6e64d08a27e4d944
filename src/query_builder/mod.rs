//! Pure SQL construction: where descriptors, SELECT/INSERT/UPDATE/DELETE and table locks.
//!
//! Every builder is stateless and returns either the finished SQL text or an
//! `RdsError::Statement` before anything reaches a connection. Builders that quote
//! values have a `_with` variant taking the [`Dialect`](crate::Dialect) to quote for;
//! the plain form quotes for MySQL.

mod dml;
mod lock;
mod predicate;
mod select;

pub use dml::{
    UpdateOptions, UpdateRow, build_delete, build_delete_with, build_insert, build_insert_with,
    build_update, build_update_rows, build_update_rows_with, build_update_with,
};
pub use lock::{LockTableOption, build_lock_tables, build_unlock_tables};
pub use predicate::{
    CompareOp, Condition, Where, build_optional_where, build_optional_where_with, build_where,
    build_where_with,
};
pub use select::{
    Direction, OrderBy, SelectOptions, build_count, build_count_with, build_limit, build_order_by,
    build_select, build_select_statement, build_select_statement_with,
};
