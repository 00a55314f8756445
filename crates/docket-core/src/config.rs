use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for the collection cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Wall-clock budget for a single search scan.
    pub search_timeout_ms: u64,
    /// Period of the eviction sweep.
    pub sweep_interval_ms: u64,
    /// Idle time after which a loaded collection is dropped from memory.
    pub idle_threshold_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            search_timeout_ms: 2_500,
            sweep_interval_ms: 60_000,
            idle_threshold_ms: 30 * 60_000,
        }
    }
}

impl CacheSettings {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn idle_threshold(&self) -> Duration {
        Duration::from_millis(self.idle_threshold_ms)
    }
}
