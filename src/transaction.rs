use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::connection::Connection;
use crate::diagnostics::Instrumentation;
use crate::driver::{Driver, dialect_of};
use crate::error::RdsError;
use crate::escape::Dialect;
use crate::operator::Queryable;
use crate::results::ResultSet;

/// A transaction that owns its connection until commit or rollback.
///
/// After either, the connection is back in the pool and every further call
/// returns [`RdsError::TransactionFinalized`].
pub struct Transaction<M: Driver> {
    conn: Option<Connection<M>>,
    instrumentation: Arc<Instrumentation>,
    committed: bool,
    rolled_back: bool,
}

impl<M: Driver> Transaction<M> {
    pub(crate) fn new(conn: Connection<M>, instrumentation: Arc<Instrumentation>) -> Self {
        Self {
            conn: Some(conn),
            instrumentation,
            committed: false,
            rolled_back: false,
        }
    }

    fn conn_mut(&mut self) -> Result<&mut Connection<M>, RdsError> {
        self.conn.as_mut().ok_or(RdsError::TransactionFinalized)
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    #[must_use]
    pub fn is_rolled_back(&self) -> bool {
        self.rolled_back
    }

    /// Whether the transaction still holds its connection.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.conn.is_some()
    }

    /// Commit and release the connection. The connection is released even if `COMMIT` fails.
    ///
    /// # Errors
    /// Returns `RdsError::TransactionFinalized` if already committed or rolled back,
    /// otherwise the driver error.
    pub async fn commit(&mut self) -> Result<(), RdsError> {
        let mut conn = self.conn.take().ok_or(RdsError::TransactionFinalized)?;
        let result = conn.commit().await;
        self.committed = true;
        conn.release();
        result
    }

    /// Roll back and release the connection. The connection is released even if `ROLLBACK` fails.
    ///
    /// # Errors
    /// Returns `RdsError::TransactionFinalized` if already committed or rolled back,
    /// otherwise the driver error.
    pub async fn rollback(&mut self) -> Result<(), RdsError> {
        let mut conn = self.conn.take().ok_or(RdsError::TransactionFinalized)?;
        let result = conn.rollback().await;
        self.rolled_back = true;
        conn.release();
        result
    }
}

impl<M: Driver> Drop for Transaction<M> {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take()
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            tracing::warn!(
                connection_id = conn.id(),
                "transaction dropped while open; rolling back"
            );
            handle.spawn(async move {
                let _ = conn.rollback().await;
            });
        }
    }
}

impl<M: Driver> fmt::Debug for Transaction<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("conn", &self.conn)
            .field("committed", &self.committed)
            .field("rolled_back", &self.rolled_back)
            .finish()
    }
}

#[async_trait]
impl<M: Driver> Queryable for Transaction<M> {
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, RdsError> {
        self.conn_mut()?.execute(sql).await
    }

    fn dialect(&self) -> Dialect {
        dialect_of::<M>()
    }

    fn instrumentation(&self) -> &Arc<Instrumentation> {
        &self.instrumentation
    }

    fn connection_id(&self) -> Option<u64> {
        self.conn.as_ref().map(Connection::id)
    }
}

/// Shared handle to one transaction, as handed to scope work.
///
/// Clones refer to the same transaction. Queries through different clones are
/// serialized on an internal lock.
pub struct TransactionHandle<M: Driver> {
    inner: Arc<Mutex<Transaction<M>>>,
    instrumentation: Arc<Instrumentation>,
    connection_id: u64,
}

impl<M: Driver> Clone for TransactionHandle<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            instrumentation: Arc::clone(&self.instrumentation),
            connection_id: self.connection_id,
        }
    }
}

impl<M: Driver> TransactionHandle<M> {
    pub(crate) fn new(transaction: Transaction<M>) -> Self {
        let instrumentation = Arc::clone(&transaction.instrumentation);
        let connection_id = transaction.connection_id().unwrap_or_default();
        Self {
            inner: Arc::new(Mutex::new(transaction)),
            instrumentation,
            connection_id,
        }
    }

    pub async fn is_live(&self) -> bool {
        self.inner.lock().await.is_live()
    }

    pub async fn is_committed(&self) -> bool {
        self.inner.lock().await.is_committed()
    }

    pub async fn is_rolled_back(&self) -> bool {
        self.inner.lock().await.is_rolled_back()
    }

    /// Commit (or roll back) only if nothing has finalized the transaction yet.
    pub(crate) async fn finish_if_live(&self, commit: bool) -> Result<(), RdsError> {
        let mut transaction = self.inner.lock().await;
        match (transaction.is_live(), commit) {
            (false, _) => Ok(()),
            (true, true) => transaction.commit().await,
            (true, false) => transaction.rollback().await,
        }
    }

    /// # Errors
    /// See [`Transaction::commit`].
    pub async fn commit(&self) -> Result<(), RdsError> {
        self.inner.lock().await.commit().await
    }

    /// # Errors
    /// See [`Transaction::rollback`].
    pub async fn rollback(&self) -> Result<(), RdsError> {
        self.inner.lock().await.rollback().await
    }
}

impl<M: Driver> From<Transaction<M>> for TransactionHandle<M> {
    fn from(transaction: Transaction<M>) -> Self {
        Self::new(transaction)
    }
}

impl<M: Driver> fmt::Debug for TransactionHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("connection_id", &self.connection_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<M: Driver> Queryable for TransactionHandle<M> {
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, RdsError> {
        self.inner.lock().await.execute(sql).await
    }

    fn dialect(&self) -> Dialect {
        dialect_of::<M>()
    }

    fn instrumentation(&self) -> &Arc<Instrumentation> {
        &self.instrumentation
    }

    fn connection_id(&self) -> Option<u64> {
        Some(self.connection_id)
    }
}
