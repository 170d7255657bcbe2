//! Transaction identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a transaction, assigned at `beginTransaction()`.
///
/// Wraps a `Uuid` rather than exposing `Uuid` directly at the API surface,
/// so the engine can format it consistently (`SYSTEM` for the synthetic
/// transaction id used by CHECKPOINT records) without callers depending on
/// the underlying representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    /// Generate a new, random transaction id.
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }

    /// The literal transaction id used to tag CHECKPOINT records, which are
    /// not owned by any user transaction.
    pub fn system() -> &'static str {
        "SYSTEM"
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_ids() {
        assert_ne!(TransactionId::new(), TransactionId::new());
    }

    #[test]
    fn display_matches_uuid() {
        let id = TransactionId::new();
        assert_eq!(id.to_string(), id.0.to_string());
    }
}
