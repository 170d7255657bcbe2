//! The transaction registry: per-transaction state, operation list, and the
//! active/committed/aborted status machine. `begin` is the one place
//! that appends the `BEGIN` record, so a transaction's `start_lsn` is always
//! the LSN of its own `BEGIN`.

use ledgerdb_core::{Error, Result, TransactionId};
use ledgerdb_durability::{Wal, WalOperation};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Which kind of data-mutating operation a transaction recorded against a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// A `write` call.
    Write,
    /// A `delete` call.
    Delete,
}

/// One entry in a transaction's ordered operation list.
#[derive(Debug, Clone)]
pub struct TransactionOperation {
    /// The document key the operation targeted.
    pub key: String,
    /// Whether this was a write or a delete.
    pub kind: OperationKind,
}

/// The three terminal-or-active states a transaction passes through.
/// Transitions out of `Active` are terminal: once `Committed` or `Aborted`,
/// a transaction never changes state again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Created by `begin`, not yet committed or rolled back.
    Active,
    /// `commit` completed: WAL flushed, effects applied, locks released.
    Committed,
    /// `rollback` completed: locks released, no effects were applied.
    Aborted,
}

/// A transaction's bookkeeping record.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    /// This transaction's id.
    pub id: TransactionId,
    /// LSN of this transaction's own `BEGIN` entry.
    pub start_lsn: u64,
    /// Operations recorded in call order.
    pub operations: Vec<TransactionOperation>,
    /// Current status.
    pub status: TransactionStatus,
}

/// Tracks every transaction's state for the lifetime of the engine process.
/// One process-wide instance, guarded by a single short-critical-section
/// mutex, per the shared-mutable-state design note.
pub struct TransactionRegistry {
    transactions: Mutex<HashMap<TransactionId, TransactionRecord>>,
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        TransactionRegistry {
            transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Start a new transaction: append its `BEGIN` record to `wal`, record
    /// the returned LSN as `start_lsn`, and register it as `Active`. Never
    /// blocks on a lock (no lock is taken here).
    pub fn begin(&self, wal: &Wal) -> Result<TransactionId> {
        let id = TransactionId::new();
        let start_lsn = wal.append(&id.to_string(), WalOperation::Begin, None, None, None)?;
        self.transactions.lock().insert(
            id,
            TransactionRecord {
                id,
                start_lsn,
                operations: Vec::new(),
                status: TransactionStatus::Active,
            },
        );
        tracing::debug!(txn = %id, start_lsn, "transaction began");
        Ok(id)
    }

    /// Fail with `InvalidTransaction` unless `id` is known and `Active`.
    pub fn require_active(&self, id: TransactionId) -> Result<()> {
        match self.transactions.lock().get(&id) {
            Some(record) if record.status == TransactionStatus::Active => Ok(()),
            _ => Err(Error::InvalidTransaction(id.0)),
        }
    }

    /// The LSN of `id`'s `BEGIN` record. Used by the engine to scope its
    /// in-transaction WAL visibility scan.
    pub fn start_lsn(&self, id: TransactionId) -> Result<u64> {
        self.transactions
            .lock()
            .get(&id)
            .map(|record| record.start_lsn)
            .ok_or(Error::InvalidTransaction(id.0))
    }

    /// Append `{key, kind}` to `id`'s operation list. Fails if `id` is not
    /// `Active` (a concurrent finalize raced this call).
    pub fn record_operation(&self, id: TransactionId, key: &str, kind: OperationKind) -> Result<()> {
        let mut transactions = self.transactions.lock();
        let record = transactions
            .get_mut(&id)
            .ok_or(Error::InvalidTransaction(id.0))?;
        if record.status != TransactionStatus::Active {
            return Err(Error::InvalidTransaction(id.0));
        }
        record.operations.push(TransactionOperation {
            key: key.to_string(),
            kind,
        });
        Ok(())
    }

    /// Transition `id` from `Active` to the given terminal `status`,
    /// returning a snapshot of its final record. Fails if `id` is not
    /// `Active` (transitions are terminal; this also rejects double-commit
    /// and double-rollback).
    pub fn finalize(&self, id: TransactionId, status: TransactionStatus) -> Result<TransactionRecord> {
        debug_assert_ne!(status, TransactionStatus::Active);
        let mut transactions = self.transactions.lock();
        let record = transactions
            .get_mut(&id)
            .ok_or(Error::InvalidTransaction(id.0))?;
        if record.status != TransactionStatus::Active {
            return Err(Error::InvalidTransaction(id.0));
        }
        record.status = status;
        tracing::debug!(txn = %id, ?status, "transaction finalized");
        Ok(record.clone())
    }

    /// Ids of every `Active` transaction, ordered by `start_lsn` for a
    /// stable, deterministic presentation.
    pub fn active_ids(&self) -> Vec<TransactionId> {
        let transactions = self.transactions.lock();
        let mut ordered: Vec<(u64, TransactionId)> = transactions
            .values()
            .filter(|record| record.status == TransactionStatus::Active)
            .map(|record| (record.start_lsn, record.id))
            .collect();
        ordered.sort_by_key(|(lsn, _)| *lsn);
        ordered.into_iter().map(|(_, id)| id).collect()
    }
}
