use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::MILLIS_PER_HOUR;

/// How long a deep link is waited for, and how often the wait is re-checked.
pub const DEEP_LINK_TIMEOUT: Duration = Duration::from_secs(5);
/// Visits created longer ago than this are dropped from the working set.
pub const VISIT_STALENESS_MS: u64 = 24 * MILLIS_PER_HOUR;
pub const SNAPSHOT_KEY: &str = "session_snapshot_v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub deep_link_timeout: Duration,
    pub visit_staleness_ms: u64,
    pub snapshot_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deep_link_timeout: DEEP_LINK_TIMEOUT,
            visit_staleness_ms: VISIT_STALENESS_MS,
            snapshot_key: SNAPSHOT_KEY.to_string(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn with_deep_link_timeout(mut self, timeout: Duration) -> Self {
        self.deep_link_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_snapshot_key(mut self, key: impl Into<String>) -> Self {
        self.snapshot_key = key.into();
        self
    }
}
