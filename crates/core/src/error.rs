//! Error types shared across the ledgerdb crates.
//!
//! `Error` is the closed taxonomy surfaced to callers of the engine API
//! (see the Engine API table): six kinds, each mapping to a distinct
//! failure mode of the WAL, lock manager, or transaction registry.

use std::io;
use thiserror::Error;

/// Result type alias used throughout ledgerdb.
pub type Result<T> = std::result::Result<T, Error>;

/// Closed error taxonomy surfaced by the storage engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Key failed the key-safety rules (empty, or contains `/`, `\`, or `..`).
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Operation attempted against a transaction that is not active.
    #[error("transaction {0} is not active")]
    InvalidTransaction(uuid::Uuid),

    /// Lock acquisition exceeded the deadlock timeout.
    #[error("lock timeout acquiring {mode} lock on {key:?} for transaction {txn}")]
    LockTimeout {
        /// Key the lock was requested for.
        key: String,
        /// Transaction that timed out.
        txn: uuid::Uuid,
        /// Requested mode ("shared" or "exclusive").
        mode: &'static str,
    },

    /// The transaction was aborted (e.g. a queued lock request was cancelled
    /// by `releaseAll`, or recovery rolled it back).
    #[error("transaction {0} aborted")]
    TransactionAborted(uuid::Uuid),

    /// I/O error on the WAL's critical path (flush during commit/rollback).
    #[error("WAL I/O error: {0}")]
    WalIoError(#[from] io::Error),

    /// Commit failed after the COMMIT record was durable; the effects will
    /// be reconciled by Redo on the next recovery pass.
    #[error("commit failed applying transaction {txn} to disk: {reason}")]
    CommitFailed {
        /// Transaction whose apply failed.
        txn: uuid::Uuid,
        /// Underlying reason.
        reason: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::WalIoError(io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_key_display() {
        let e = Error::InvalidKey {
            key: "a/b".to_string(),
            reason: "contains '/'".to_string(),
        };
        assert!(e.to_string().contains("a/b"));
    }

    #[test]
    fn from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::WalIoError(_)));
    }

    #[test]
    fn from_serde_json_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let e: Error = parse_err.into();
        assert!(matches!(e, Error::WalIoError(_)));
    }
}
