//! Nested transaction scopes.
//!
//! A [`TransactionContext`] records the transaction shared by one call tree and
//! how many scopes are currently inside it. The first scope to enter begins the
//! transaction and owns it; nested scopes reuse it. Only the outermost scope
//! commits, while any failing scope rolls back.
//!
//! The context can be passed explicitly (`*_in` methods on the client) or
//! carried ambiently through the current task. Ambient contexts live in a
//! task-local set up by the outermost ambient scope, so tasks spawned from inside
//! a scope start without one. Do not mix the two styles in one call tree: an
//! explicit context is invisible to ambient scopes and the other way round, so
//! nesting would open a second transaction.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::client::Client;
use crate::driver::Driver;
use crate::error::RdsError;
use crate::transaction::TransactionHandle;

struct ScopeState<M: Driver> {
    transaction: Option<TransactionHandle<M>>,
    nest_count: usize,
    doomed: bool,
}

/// Shared record of the active transaction for one call tree.
///
/// Clones refer to the same record.
pub struct TransactionContext<M: Driver> {
    state: Arc<Mutex<ScopeState<M>>>,
}

impl<M: Driver> TransactionContext<M> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScopeState {
                transaction: None,
                nest_count: 0,
                doomed: false,
            })),
        }
    }

    /// Number of scopes currently inside this context.
    pub async fn nest_count(&self) -> usize {
        self.state.lock().await.nest_count
    }

    /// Whether a scope currently holds a transaction in this context.
    pub async fn is_active(&self) -> bool {
        self.state.lock().await.transaction.is_some()
    }

    /// Decrement the count; the owner clears the context once it reaches zero.
    ///
    /// Returns the remaining count and whether any scope in this tree was doomed.
    async fn leave(&self, owns: bool) -> (usize, bool) {
        let mut state = self.state.lock().await;
        state.nest_count = state.nest_count.saturating_sub(1);
        let remaining = state.nest_count;
        let doomed = state.doomed;
        if owns && remaining == 0 {
            state.transaction = None;
            state.doomed = false;
        }
        (remaining, doomed)
    }
}

impl<M: Driver> Default for TransactionContext<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Driver> Clone for TransactionContext<M> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<M: Driver> fmt::Debug for TransactionContext<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext").finish_non_exhaustive()
    }
}

/// One entered scope. Must be closed with [`finish`](ScopeGuard::finish).
struct ScopeGuard<M: Driver> {
    ctx: TransactionContext<M>,
    transaction: TransactionHandle<M>,
    owns: bool,
    finished: bool,
}

impl<M: Driver> ScopeGuard<M> {
    async fn enter(
        client: &Client<M>,
        ctx: &TransactionContext<M>,
        doomed: bool,
    ) -> Result<Self, RdsError> {
        // Held across BEGIN so concurrent entries cannot both start a transaction.
        let mut state = ctx.state.lock().await;
        // With no scope inside, a leftover transaction is stale (concurrent siblings
        // where the owner left first) and a fresh one is begun.
        let reusable = state.transaction.clone().filter(|_| state.nest_count > 0);
        let (transaction, owns) = if let Some(transaction) = reusable {
            state.nest_count += 1;
            (transaction, false)
        } else {
            let transaction = TransactionHandle::new(client.begin_transaction().await?);
            state.transaction = Some(transaction.clone());
            state.nest_count = 1;
            state.doomed = false;
            (transaction, true)
        };
        state.doomed |= doomed;
        tracing::debug!(
            nest_count = state.nest_count,
            owns,
            doomed = state.doomed,
            "enter transaction scope"
        );
        drop(state);

        Ok(Self {
            ctx: ctx.clone(),
            transaction,
            owns,
            finished: false,
        })
    }

    async fn finish<T>(mut self, result: Result<T, RdsError>) -> Result<T, RdsError> {
        self.finished = true;
        let (remaining, doomed) = self.ctx.leave(self.owns).await;

        let finalize = match &result {
            Err(_) => self.transaction.finish_if_live(false).await,
            Ok(_) if remaining == 0 => self.transaction.finish_if_live(!doomed).await,
            Ok(_) => Ok(()),
        };
        tracing::debug!(
            remaining,
            owns = self.owns,
            failed = result.is_err(),
            "leave transaction scope"
        );

        match (result, finalize) {
            (result, Ok(())) => result,
            (Ok(_), Err(error)) => Err(error),
            (Err(cause), Err(error)) => Err(RdsError::Finalize {
                error: Box::new(error),
                cause: Box::new(cause),
            }),
        }
    }
}

impl<M: Driver> Drop for ScopeGuard<M> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let ctx = self.ctx.clone();
        let transaction = self.transaction.clone();
        let owns = self.owns;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                ctx.leave(owns).await;
                if owns {
                    tracing::warn!("transaction scope abandoned; rolling back");
                    let _ = transaction.finish_if_live(false).await;
                }
            });
        }
    }
}

/// Run `work` inside a scope of `ctx`.
pub(crate) async fn run_scope<M, F, Fut, T>(
    client: &Client<M>,
    ctx: &TransactionContext<M>,
    doomed: bool,
    work: F,
) -> Result<T, RdsError>
where
    M: Driver,
    F: FnOnce(TransactionHandle<M>) -> Fut + Send,
    Fut: Future<Output = Result<T, RdsError>> + Send,
    T: Send,
{
    let guard = ScopeGuard::enter(client, ctx, doomed).await?;
    let result = work(guard.transaction.clone()).await;
    guard.finish(result).await
}

tokio::task_local! {
    static AMBIENT_SCOPES: AmbientScopes;
}

/// Contexts visible to the current task, keyed by client.
#[derive(Clone, Default)]
struct AmbientScopes(Arc<HashMap<u64, Arc<dyn Any + Send + Sync>>>);

impl AmbientScopes {
    fn get<M: Driver>(&self, key: u64) -> Option<TransactionContext<M>> {
        self.0
            .get(&key)
            .and_then(|ctx| ctx.downcast_ref::<TransactionContext<M>>())
            .cloned()
    }

    fn with<M: Driver>(&self, key: u64, ctx: TransactionContext<M>) -> Self {
        let mut scopes = (*self.0).clone();
        scopes.insert(key, Arc::new(ctx));
        Self(Arc::new(scopes))
    }
}

/// Run `work` in the ambient context of the current task, creating it if this is
/// the outermost ambient scope for `client`.
pub(crate) async fn run_ambient_scope<M, F, Fut, T>(
    client: &Client<M>,
    doomed: bool,
    work: F,
) -> Result<T, RdsError>
where
    M: Driver,
    F: FnOnce(TransactionHandle<M>) -> Fut + Send,
    Fut: Future<Output = Result<T, RdsError>> + Send,
    T: Send,
{
    let key = client.key();
    let current = AMBIENT_SCOPES.try_with(Clone::clone).ok();
    if let Some(ctx) = current.as_ref().and_then(|scopes| scopes.get::<M>(key)) {
        return run_scope(client, &ctx, doomed, work).await;
    }

    let ctx = TransactionContext::new();
    let scopes = current.unwrap_or_default().with(key, ctx.clone());
    AMBIENT_SCOPES
        .scope(scopes, run_scope(client, &ctx, doomed, work))
        .await
}
