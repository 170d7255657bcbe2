//! Tunable defaults for the storage engine, layered over `WalConfig` with
//! the lock-manager's deadlock timeout and queue-warning threshold. Read
//! from/written to `<dbRoot>/ledgerdb.toml` by the `ledgerdb-api` facade;
//! the engine itself only ever sees the resolved struct.

use ledgerdb_durability::WalConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-wide tuning parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// WAL buffering and rotation thresholds.
    #[serde(flatten)]
    pub wal: WalConfig,
    /// Deadlock timeout for lock acquisition, in milliseconds (default 30000).
    pub lock_timeout_ms: u64,
    /// Waiter-queue length above which a key is flagged for observability
    /// for observability, default 8.
    pub lock_queue_warn_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            wal: WalConfig::default(),
            lock_timeout_ms: 30_000,
            lock_queue_warn_threshold: 8,
        }
    }
}

impl EngineConfig {
    /// The deadlock timeout as a `Duration`.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// A configuration with small thresholds, for tests that want to
    /// exercise buffering, rotation, or timeouts without waiting 30s.
    pub fn for_testing() -> Self {
        EngineConfig {
            wal: WalConfig::for_testing(),
            lock_timeout_ms: 200,
            lock_queue_warn_threshold: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = EngineConfig::default();
        assert_eq!(config.lock_timeout_ms, 30_000);
        assert_eq!(config.lock_queue_warn_threshold, 8);
        assert_eq!(config.wal.buffer_threshold, 100);
    }

    #[test]
    fn round_trips_through_json() {
        let config = EngineConfig::for_testing();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.lock_timeout_ms, config.lock_timeout_ms);
    }
}
