//! The WAL entry shape: one JSON object per logical record.
//!
//! `LogEntry.operation` is modeled as a tagged enum with per-variant
//! payloads, but serialized flat (all optional fields present-or-absent on
//! the same struct) so the on-disk line format stays a single JSON object
//! per entry, as the data directory layout requires.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The six operations a WAL entry can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WalOperation {
    /// Marks the start of a transaction.
    Begin,
    /// A document write (patch already merged into an after-image).
    Write,
    /// A document delete.
    Delete,
    /// Marks a transaction durably committed.
    Commit,
    /// Marks a transaction aborted.
    Rollback,
    /// A recovery optimization marker; owned by the synthetic `SYSTEM` txn.
    Checkpoint,
}

/// A single WAL record, ordered by `lsn`.
///
/// `key`, `before_image`, and `after_image` are `None` for BEGIN/COMMIT/
/// ROLLBACK/CHECKPOINT and `Some` for WRITE/DELETE, matching the data
/// model's "absent otherwise" rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonically increasing log sequence number.
    pub lsn: u64,
    /// Owning transaction id, or the literal `"SYSTEM"` for CHECKPOINT.
    pub transaction_id: String,
    /// The operation this entry records.
    pub operation: WalOperation,
    /// Document key, for WRITE/DELETE only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub key: Option<String>,
    /// Value immediately before this operation; `null` if absent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub before_image: Option<Value>,
    /// Value immediately after this operation; `null` for DELETE.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub after_image: Option<Value>,
    /// Wall-clock milliseconds at append; informational only.
    pub timestamp: u64,
    /// Lowercase hex digest over every other field, canonically ordered.
    pub checksum: String,
}

impl LogEntry {
    /// Fields this entry would carry if serialized with `checksum` cleared,
    /// used both to compute the checksum on append and to verify it on scan.
    pub(crate) fn canonical_payload(&self) -> String {
        format!(
            "{}|{}|{:?}|{}|{}|{}|{}",
            self.lsn,
            self.transaction_id,
            self.operation,
            self.key.as_deref().unwrap_or(""),
            self.before_image
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            self.after_image
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
            self.timestamp,
        )
    }
}
