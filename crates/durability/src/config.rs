//! WAL tuning parameters.

/// WAL configuration parameters.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WalConfig {
    /// Number of entries buffered in memory before an implicit flush
    /// (default: 100; COMMIT/ROLLBACK always force a flush regardless).
    pub buffer_threshold: usize,
    /// Size at which the active log is rotated to a timestamped archive
    /// (default: 10 MiB).
    pub rotation_threshold_bytes: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            buffer_threshold: 100,
            rotation_threshold_bytes: 10 * 1024 * 1024,
        }
    }
}

impl WalConfig {
    /// Builder-style override of `buffer_threshold`.
    pub fn with_buffer_threshold(mut self, n: usize) -> Self {
        self.buffer_threshold = n;
        self
    }

    /// Builder-style override of `rotation_threshold_bytes`.
    pub fn with_rotation_threshold_bytes(mut self, n: u64) -> Self {
        self.rotation_threshold_bytes = n;
        self
    }

    /// A configuration with small thresholds, for exercising buffering and
    /// rotation without writing megabytes of test fixtures.
    pub fn for_testing() -> Self {
        WalConfig {
            buffer_threshold: 4,
            rotation_threshold_bytes: 1024,
        }
    }
}
