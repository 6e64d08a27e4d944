//! Query hooks and best-effort diagnostic notifications.
//!
//! Nothing here participates in control flow: a full or unobserved diagnostics
//! channel never fails a query.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::error::RdsError;
use crate::results::ResultSet;

/// Runs before each query; returning `Some` replaces the SQL that is sent.
pub type BeforeQueryHook = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Runs after each query with the outcome and its duration.
pub type AfterQueryHook = Arc<dyn Fn(&QueryOutcome<'_>) + Send + Sync>;

/// What an [`AfterQueryHook`] sees.
#[derive(Debug)]
pub struct QueryOutcome<'a> {
    pub sql: &'a str,
    pub result: Option<&'a ResultSet>,
    pub duration: Duration,
    pub error: Option<&'a RdsError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    ConnectionCreated {
        connection_id: u64,
    },
    ConnectionAcquired {
        connection_id: u64,
    },
    ConnectionReleased {
        connection_id: u64,
    },
    QueryStart {
        connection_id: Option<u64>,
        sql: String,
    },
    QueryEnd {
        connection_id: Option<u64>,
        sql: String,
        duration: Duration,
        error: Option<String>,
    },
}

/// Hooks and the diagnostics channel shared by a client and everything it hands out.
pub struct Instrumentation {
    pub(crate) before_query: Vec<BeforeQueryHook>,
    pub(crate) after_query: Vec<AfterQueryHook>,
    events: broadcast::Sender<DiagnosticEvent>,
}

impl Instrumentation {
    pub(crate) fn new(
        before_query: Vec<BeforeQueryHook>,
        after_query: Vec<AfterQueryHook>,
        capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            before_query,
            after_query,
            events,
        }
    }

    pub(crate) fn publish(&self, event: DiagnosticEvent) {
        // No subscribers is the common case.
        let _ = self.events.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.events.subscribe()
    }

    /// Apply the before-query hooks in registration order.
    pub(crate) fn rewrite(&self, sql: String) -> String {
        self.before_query
            .iter()
            .fold(sql, |sql, hook| hook(&sql).unwrap_or(sql))
    }

    pub(crate) fn after(&self, outcome: &QueryOutcome<'_>) {
        for hook in &self.after_query {
            hook(outcome);
        }
    }
}

impl Default for Instrumentation {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), 64)
    }
}

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("before_query", &self.before_query.len())
            .field("after_query", &self.after_query.len())
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}
