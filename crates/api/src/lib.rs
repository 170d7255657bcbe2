//! The `Database` facade: the thin application-facing wrapper around
//! [`ledgerdb_engine::StorageEngine`] that owns `ledgerdb.toml` loading.
//! Schema validation, cloud backup/restore, document caching, and
//! auto-transaction convenience wrapping are deliberately not implemented
//! here — they are external collaborators that would consume this
//! same engine API surface.

#![warn(missing_docs)]

mod config;

use ledgerdb_core::{Result, TransactionId};
use ledgerdb_engine::StorageEngine;
use serde_json::Value;
use std::path::Path;

/// An open embedded document store.
pub struct Database {
    engine: StorageEngine,
}

impl Database {
    /// Open (or create) the document store at `data_dir`. Loads
    /// `ledgerdb.toml` from the directory (writing a default one if absent)
    /// and runs crash recovery before returning.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let config = config::load_or_init(data_dir)?;
        let engine = StorageEngine::open_with_config(data_dir, config)?;
        Ok(Database { engine })
    }

    /// Start a new transaction. Never blocks.
    pub fn begin_transaction(&self) -> Result<TransactionId> {
        self.engine.begin_transaction()
    }

    /// Read `key`'s currently visible value under `txn`: `None` if the
    /// document does not exist.
    pub fn read(&self, txn: TransactionId, key: &str) -> Result<Option<Value>> {
        self.engine.read(txn, key)
    }

    /// Deep-merge `patch` onto `key`'s currently visible value under `txn`.
    /// Not applied to disk until `txn` commits.
    pub fn write(&self, txn: TransactionId, key: &str, patch: Value) -> Result<()> {
        self.engine.write(txn, key, patch)
    }

    /// Record a pending delete of `key` under `txn`. Not applied to disk
    /// until `txn` commits.
    pub fn delete(&self, txn: TransactionId, key: &str) -> Result<()> {
        self.engine.delete(txn, key)
    }

    /// Commit `txn`: flush the WAL, apply its effects, release its locks.
    pub fn commit(&self, txn: TransactionId) -> Result<()> {
        self.engine.commit(txn)
    }

    /// Roll back `txn`: release its locks, apply no effects.
    pub fn rollback(&self, txn: TransactionId) -> Result<()> {
        self.engine.rollback(txn)
    }

    /// Ids of every currently active transaction, ordered by start LSN.
    pub fn active_transactions(&self) -> Vec<TransactionId> {
        self.engine.active_transactions()
    }

    /// Append and flush a `CHECKPOINT` record. An optimization marker only.
    pub fn force_checkpoint(&self) -> Result<()> {
        self.engine.force_checkpoint()
    }

    /// Roll back any still-active transactions (best-effort) and flush the
    /// WAL. Callers should invoke this before dropping the `Database` if a
    /// clean shutdown matters; it is not run automatically on `Drop`.
    pub fn shutdown(&self) -> Result<()> {
        self.engine.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn open_write_commit_read_round_trip() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();

        let txn = db.begin_transaction().unwrap();
        db.write(txn, "account:1", json!({"balance": 1000})).unwrap();
        db.commit(txn).unwrap();

        let txn2 = db.begin_transaction().unwrap();
        let value = db.read(txn2, "account:1").unwrap();
        assert_eq!(value, Some(json!({"balance": 1000})));
        db.commit(txn2).unwrap();
    }

    #[test]
    fn reopening_preserves_committed_state() {
        let dir = tempdir().unwrap();
        {
            let db = Database::open(dir.path()).unwrap();
            let txn = db.begin_transaction().unwrap();
            db.write(txn, "doc", json!({"a": 1})).unwrap();
            db.commit(txn).unwrap();
        }

        let db = Database::open(dir.path()).unwrap();
        let txn = db.begin_transaction().unwrap();
        assert_eq!(db.read(txn, "doc").unwrap(), Some(json!({"a": 1})));
        db.commit(txn).unwrap();
    }

    #[test]
    fn shutdown_rolls_back_active_transactions() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let txn = db.begin_transaction().unwrap();
        db.write(txn, "doc", json!({"a": 1})).unwrap();
        db.shutdown().unwrap();
        assert!(db.active_transactions().is_empty());
    }

    #[test]
    fn writes_default_config_file_on_first_open() {
        let dir = tempdir().unwrap();
        let _db = Database::open(dir.path()).unwrap();
        assert!(dir.path().join("ledgerdb.toml").exists());
    }
}
