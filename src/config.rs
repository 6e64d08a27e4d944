use std::time::Duration;

use serde::Deserialize;

use crate::driver::{Driver, InstrumentedManager};
use crate::error::RdsError;

/// Pool sizing for a [`Client`](crate::Client).
///
/// Deserializes from e.g. `{"max_size": 4, "connection_timeout_ms": 500}`; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub max_size: u32,
    pub min_idle: Option<u32>,
    /// How long a checkout may wait before failing with a get-connection error.
    pub connection_timeout_ms: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: None,
            connection_timeout_ms: 30_000,
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.max_size = max_size;
        self
    }

    #[must_use]
    pub fn min_idle(mut self, min_idle: u32) -> Self {
        self.min_idle = Some(min_idle);
        self
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// # Errors
    /// Returns `RdsError::Config` for a zero `max_size` or timeout, or a `min_idle` above `max_size`.
    pub fn validate(&self) -> Result<(), RdsError> {
        if self.max_size == 0 {
            return Err(RdsError::Config("max_size must be greater than zero".into()));
        }
        if self.connection_timeout_ms == 0 {
            return Err(RdsError::Config(
                "connection_timeout_ms must be greater than zero".into(),
            ));
        }
        if let Some(min_idle) = self.min_idle
            && min_idle > self.max_size
        {
            return Err(RdsError::Config(format!(
                "min_idle ({min_idle}) exceeds max_size ({})",
                self.max_size
            )));
        }
        Ok(())
    }

    pub(crate) fn apply<M: Driver>(
        &self,
        builder: bb8::Builder<InstrumentedManager<M>>,
    ) -> bb8::Builder<InstrumentedManager<M>> {
        builder
            .max_size(self.max_size)
            .min_idle(self.min_idle)
            .connection_timeout(Duration::from_millis(self.connection_timeout_ms))
    }
}
