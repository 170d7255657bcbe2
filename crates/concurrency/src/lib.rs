//! Two-phase locking and transaction bookkeeping for ledgerdb.
//!
//! [`LockManager`] grants per-key shared/exclusive locks with FIFO wait
//! queues and timeout-based deadlock handling. [`TransactionRegistry`]
//! tracks each transaction's state, start LSN, and operation list through
//! its active/committed/aborted lifecycle. Neither touches the WAL's
//! data-mutating records directly (that is the storage engine's job); the
//! registry only appends `BEGIN`, since `start_lsn` must be the LSN of a
//! transaction's own `BEGIN` record.

#![warn(missing_docs)]

pub mod lock;
pub mod transaction;

pub use lock::{LockManager, LockMode};
pub use transaction::{
    OperationKind, TransactionOperation, TransactionRecord, TransactionRegistry, TransactionStatus,
};
