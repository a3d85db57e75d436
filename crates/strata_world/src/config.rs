//! Streaming configuration.

use serde::{Deserialize, Serialize};

use crate::error::{WorldError, WorldResult};

/// Tuning knobs of the chunk streamer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Near-cache size, in chunks, above which eviction starts.
    pub cache_budget: usize,
    /// Generation worker threads.
    pub worker_threads: usize,
    /// Upper bound on evictions per tick.
    pub max_unloads_per_tick: usize,
    /// Time budget per tick for processing finished chunks, in milliseconds.
    pub ready_deadline_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            cache_budget: 1024,
            worker_threads: 4,
            max_unloads_per_tick: 64,
            ready_deadline_ms: 24,
        }
    }
}

impl StreamingConfig {
    /// Small budget and a single worker, for tests.
    #[must_use]
    pub const fn testing() -> Self {
        Self {
            cache_budget: 64,
            worker_threads: 1,
            max_unloads_per_tick: 16,
            ready_deadline_ms: 1000,
        }
    }

    /// Checks the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidConfig`] for a zero worker count, budget
    /// or unload limit.
    pub fn validate(&self) -> WorldResult<()> {
        if self.worker_threads == 0 {
            return Err(WorldError::InvalidConfig("worker_threads must be at least 1".into()));
        }
        if self.cache_budget == 0 {
            return Err(WorldError::InvalidConfig("cache_budget must be at least 1".into()));
        }
        if self.max_unloads_per_tick == 0 {
            return Err(WorldError::InvalidConfig(
                "max_unloads_per_tick must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
