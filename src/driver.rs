//! The seam between the operator layer and a pooled driver.
//!
//! Any `bb8::ManageConnection` whose connection implements [`DriverConnection`]
//! can back a [`Client`](crate::Client). The client wraps it in an
//! [`InstrumentedManager`] so every physical connection gets a stable id and
//! connection-created notifications are published.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bb8::ManageConnection;

use crate::diagnostics::{DiagnosticEvent, Instrumentation};
use crate::error::RdsError;
use crate::escape::Dialect;
use crate::results::ResultSet;

/// One physical connection as seen by the operator layer.
#[async_trait]
pub trait DriverConnection: Send + 'static {
    /// How statements sent to this connection quote values.
    const DIALECT: Dialect = Dialect::MySql;

    /// Send one fully rendered SQL statement.
    ///
    /// # Errors
    /// Returns the driver's failure for the statement.
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, RdsError>;

    async fn begin(&mut self) -> Result<(), RdsError> {
        self.execute("BEGIN").await.map(|_| ())
    }

    async fn commit(&mut self) -> Result<(), RdsError> {
        self.execute("COMMIT").await.map(|_| ())
    }

    async fn rollback(&mut self) -> Result<(), RdsError> {
        self.execute("ROLLBACK").await.map(|_| ())
    }
}

/// A bb8 manager usable as a client backend.
pub trait Driver: ManageConnection<Connection: DriverConnection, Error: Display> {}

impl<M> Driver for M where M: ManageConnection<Connection: DriverConnection, Error: Display> {}

pub(crate) fn dialect_of<M: Driver>() -> Dialect {
    <M::Connection as DriverConnection>::DIALECT
}

/// A driver connection tagged with the id assigned when it was opened.
pub struct TrackedConnection<C> {
    inner: C,
    id: u64,
}

impl<C> TrackedConnection<C> {
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.id
    }

    pub fn driver_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

/// Wraps a user driver, numbering connections and publishing their creation.
pub struct InstrumentedManager<M> {
    inner: M,
    instrumentation: Arc<Instrumentation>,
    next_id: AtomicU64,
}

impl<M> InstrumentedManager<M> {
    pub(crate) fn new(inner: M, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            inner,
            instrumentation,
            next_id: AtomicU64::new(1),
        }
    }
}

impl<M: Driver> ManageConnection for InstrumentedManager<M> {
    type Connection = TrackedConnection<M::Connection>;
    type Error = M::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        async move {
            let inner = self.inner.connect().await?;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(connection_id = id, "connection created");
            self.instrumentation
                .publish(DiagnosticEvent::ConnectionCreated { connection_id: id });
            Ok(TrackedConnection { inner, id })
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { self.inner.is_valid(&mut conn.inner).await }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        self.inner.has_broken(&mut conn.inner)
    }
}
