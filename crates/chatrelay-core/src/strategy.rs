use std::time::Duration;

use serde::Serialize;
use strum::{Display, EnumString};

/// Per-attempt deadline.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// One way of calling the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptStrategy {
    /// Attach whatever the auth provider returns.
    WithAuth,
    /// Send no auth headers at all.
    NoAuth,
}

impl AttemptStrategy {
    pub fn uses_auth(self) -> bool {
        matches!(self, AttemptStrategy::WithAuth)
    }
}

/// Ordered strategies plus the deadline applied to each attempt.
///
/// The retry budget is `strategies.len()`; attempts run back to back with no
/// backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPolicy {
    pub strategies: Vec<AttemptStrategy>,
    pub attempt_timeout: Duration,
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            strategies: vec![AttemptStrategy::WithAuth, AttemptStrategy::NoAuth],
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl RelayPolicy {
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<AttemptStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn budget(&self) -> usize {
        self.strategies.len()
    }
}
