use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bb8::Pool;
use tokio::sync::broadcast;

use crate::config::PoolOptions;
use crate::connection::Connection;
use crate::diagnostics::{
    AfterQueryHook, BeforeQueryHook, DiagnosticEvent, Instrumentation, QueryOutcome,
};
use crate::driver::{Driver, InstrumentedManager, dialect_of};
use crate::error::RdsError;
use crate::escape::Dialect;
use crate::operator::Queryable;
use crate::results::ResultSet;
use crate::scope::{TransactionContext, run_ambient_scope, run_scope};
use crate::transaction::{Transaction, TransactionHandle};

static NEXT_CLIENT_KEY: AtomicU64 = AtomicU64::new(1);

/// Pool counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Builder for [`Client`].
pub struct ClientBuilder<M> {
    manager: M,
    options: PoolOptions,
    before_query: Vec<BeforeQueryHook>,
    after_query: Vec<AfterQueryHook>,
    diagnostics_capacity: usize,
}

impl<M: Driver> ClientBuilder<M> {
    #[must_use]
    pub fn new(manager: M) -> Self {
        Self {
            manager,
            options: PoolOptions::default(),
            before_query: Vec::new(),
            after_query: Vec::new(),
            diagnostics_capacity: 64,
        }
    }

    #[must_use]
    pub fn pool_options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    /// Register a hook that sees each SQL string before it is sent and may replace it.
    #[must_use]
    pub fn before_query<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.before_query.push(Arc::new(hook));
        self
    }

    /// Register a hook that sees each query's outcome.
    #[must_use]
    pub fn after_query<F>(mut self, hook: F) -> Self
    where
        F: Fn(&QueryOutcome<'_>) + Send + Sync + 'static,
    {
        self.after_query.push(Arc::new(hook));
        self
    }

    /// Buffer size of the diagnostics channel; slow subscribers miss older events.
    #[must_use]
    pub fn diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }

    /// Build the pool and the client.
    ///
    /// # Errors
    /// Returns `RdsError::Config` for invalid pool options, or
    /// `RdsError::GetConnection` if the pool cannot open its initial connections.
    pub async fn build(self) -> Result<Client<M>, RdsError> {
        self.options.validate()?;
        let instrumentation = Arc::new(Instrumentation::new(
            self.before_query,
            self.after_query,
            self.diagnostics_capacity,
        ));
        let manager = InstrumentedManager::new(self.manager, Arc::clone(&instrumentation));
        let pool = self
            .options
            .apply(Pool::builder())
            .build(manager)
            .await
            .map_err(|e| RdsError::GetConnection(format!("pool build error: {e}")))?;

        Ok(Client {
            pool,
            instrumentation,
            key: NEXT_CLIENT_KEY.fetch_add(1, Ordering::Relaxed),
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Entry point: owns the pool, hands out connections and transactions, and runs
/// transaction scopes.
///
/// Clones share the pool, hooks and ambient scopes.
pub struct Client<M: Driver> {
    pool: Pool<InstrumentedManager<M>>,
    instrumentation: Arc<Instrumentation>,
    key: u64,
    closed: Arc<AtomicBool>,
}

impl<M: Driver> Clone for Client<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            instrumentation: Arc::clone(&self.instrumentation),
            key: self.key,
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<M: Driver> fmt::Debug for Client<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("key", &self.key)
            .field("stats", &self.stats())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<M: Driver> Client<M> {
    #[must_use]
    pub fn builder(manager: M) -> ClientBuilder<M> {
        ClientBuilder::new(manager)
    }

    /// Client with default pool options and no hooks.
    ///
    /// # Errors
    /// See [`ClientBuilder::build`].
    pub async fn new(manager: M) -> Result<Self, RdsError> {
        ClientBuilder::new(manager).build().await
    }

    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    /// Lease a connection from the pool.
    ///
    /// # Errors
    /// Returns `RdsError::GetConnection` when the pool cannot supply one in time,
    /// or `RdsError::PoolClosed` after [`end`](Client::end).
    pub async fn get_connection(&self) -> Result<Connection<M>, RdsError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RdsError::PoolClosed);
        }
        let conn = self.pool.get_owned().await.map_err(|e| {
            let err = RdsError::from(e);
            tracing::debug!(error = %err, "connection checkout failed");
            err
        })?;
        Ok(Connection::new(conn, Arc::clone(&self.instrumentation)))
    }

    /// Lease a connection and send `BEGIN` on it.
    ///
    /// # Errors
    /// Returns `RdsError::GetConnection` if no connection is available or `BEGIN` fails;
    /// in the latter case the connection goes back to the pool.
    pub async fn begin_transaction(&self) -> Result<Transaction<M>, RdsError> {
        let mut conn = self.get_connection().await?;
        if let Err(e) = conn.begin_transaction().await {
            conn.release();
            return Err(RdsError::GetConnection(format!("begin transaction error: {e}")));
        }
        Ok(Transaction::new(conn, Arc::clone(&self.instrumentation)))
    }

    /// Run `work` in the current task's ambient transaction scope for this client.
    ///
    /// Nested calls made from inside `work` (on this task) share one transaction;
    /// the outermost commits on success and any failing scope rolls back.
    ///
    /// # Errors
    /// Returns the work error, a begin/commit/rollback error, or
    /// `RdsError::Finalize` when both the work and its rollback failed.
    pub async fn begin_transaction_scope<F, Fut, T>(&self, work: F) -> Result<T, RdsError>
    where
        F: FnOnce(TransactionHandle<M>) -> Fut + Send,
        Fut: Future<Output = Result<T, RdsError>> + Send,
        T: Send,
    {
        run_ambient_scope(self, false, work).await
    }

    /// Like [`begin_transaction_scope`](Client::begin_transaction_scope) with an
    /// explicitly passed context.
    ///
    /// # Errors
    /// Same as [`begin_transaction_scope`](Client::begin_transaction_scope).
    pub async fn begin_transaction_scope_in<F, Fut, T>(
        &self,
        work: F,
        ctx: &TransactionContext<M>,
    ) -> Result<T, RdsError>
    where
        F: FnOnce(TransactionHandle<M>) -> Fut + Send,
        Fut: Future<Output = Result<T, RdsError>> + Send,
        T: Send,
    {
        run_scope(self, ctx, false, work).await
    }

    /// A scope whose outermost level always rolls back, even on success.
    ///
    /// # Errors
    /// Same as [`begin_transaction_scope`](Client::begin_transaction_scope).
    pub async fn begin_doomed_transaction_scope<F, Fut, T>(&self, work: F) -> Result<T, RdsError>
    where
        F: FnOnce(TransactionHandle<M>) -> Fut + Send,
        Fut: Future<Output = Result<T, RdsError>> + Send,
        T: Send,
    {
        run_ambient_scope(self, true, work).await
    }

    /// # Errors
    /// Same as [`begin_transaction_scope`](Client::begin_transaction_scope).
    pub async fn begin_doomed_transaction_scope_in<F, Fut, T>(
        &self,
        work: F,
        ctx: &TransactionContext<M>,
    ) -> Result<T, RdsError>
    where
        F: FnOnce(TransactionHandle<M>) -> Fut + Send,
        Fut: Future<Output = Result<T, RdsError>> + Send,
        T: Send,
    {
        run_scope(self, ctx, true, work).await
    }

    /// Receive diagnostic events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.instrumentation.subscribe()
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// Stop handing out connections. Connections already leased keep working.
    pub fn end(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::debug!(key = self.key, "client ended");
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Each call leases a connection for the duration of one statement.
#[async_trait]
impl<M: Driver> Queryable for Client<M> {
    async fn execute(&mut self, sql: &str) -> Result<ResultSet, RdsError> {
        let mut conn = self.get_connection().await?;
        conn.execute(sql).await
    }

    fn dialect(&self) -> Dialect {
        dialect_of::<M>()
    }

    fn instrumentation(&self) -> &Arc<Instrumentation> {
        &self.instrumentation
    }
}
