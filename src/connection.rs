use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bb8::PooledConnection;

use crate::diagnostics::{DiagnosticEvent, Instrumentation};
use crate::driver::{Driver, DriverConnection, InstrumentedManager, dialect_of};
use crate::error::RdsError;
use crate::escape::Dialect;
use crate::operator::Queryable;
use crate::results::ResultSet;

pub(crate) type Pooled<M> = PooledConnection<'static, InstrumentedManager<M>>;

/// One connection leased from a [`Client`](crate::Client).
///
/// The connection goes back to the pool when this value is released or dropped;
/// since [`release`](Connection::release) consumes it, a released connection cannot be reused.
pub struct Connection<M: Driver> {
    conn: Pooled<M>,
    instrumentation: Arc<Instrumentation>,
}

impl<M: Driver> Connection<M> {
    pub(crate) fn new(conn: Pooled<M>, instrumentation: Arc<Instrumentation>) -> Self {
        let connection_id = conn.connection_id();
        tracing::debug!(connection_id, "connection acquired");
        instrumentation.publish(DiagnosticEvent::ConnectionAcquired { connection_id });
        Self {
            conn,
            instrumentation,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.conn.connection_id()
    }

    /// Send `BEGIN`.
    ///
    /// # Errors
    /// Returns the driver error.
    pub async fn begin_transaction(&mut self) -> Result<(), RdsError> {
        self.conn.driver_mut().begin().await
    }

    /// # Errors
    /// Returns the driver error.
    pub async fn commit(&mut self) -> Result<(), RdsError> {
        self.conn.driver_mut().commit().await
    }

    /// # Errors
    /// Returns the driver error.
    pub async fn rollback(&mut self) -> Result<(), RdsError> {
        self.conn.driver_mut().rollback().await
    }

    /// Return the connection to the pool.
    pub fn release(self) {}
}

impl<M: Driver> Drop for Connection<M> {
    fn drop(&mut self) {
        let connection_id = self.conn.connection_id();
        tracing::debug!(connection_id, "connection released");
        self.instrumentation
            .publish(DiagnosticEvent::ConnectionReleased { connection_id });
    }
}

impl<M: Driver> fmt::Debug for Connection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.conn.connection_id())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<M: Driver> Queryable for Connection<M> {
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, RdsError> {
        self.conn.driver_mut().execute(sql).await
    }

    fn dialect(&self) -> Dialect {
        dialect_of::<M>()
    }

    fn instrumentation(&self) -> &Arc<Instrumentation> {
        &self.instrumentation
    }

    fn connection_id(&self) -> Option<u64> {
        Some(self.conn.connection_id())
    }
}
