//! # ledgerdb
//!
//! An embedded, single-node document store. Keys are strings; values are
//! JSON objects stored one file per key. Reads and writes are wrapped in
//! transactions with full ACID semantics: a write-ahead log for durability,
//! two-phase locking for isolation, and ARIES-style crash recovery.
//!
//! # Quick Start
//!
//! ```no_run
//! use ledgerdb::Database;
//! use serde_json::json;
//!
//! fn main() -> ledgerdb_core::Result<()> {
//!     let db = Database::open("./my-data")?;
//!
//!     let txn = db.begin_transaction()?;
//!     db.write(txn, "account:1", json!({"balance": 1000}))?;
//!     db.commit(txn)?;
//!
//!     let txn2 = db.begin_transaction()?;
//!     let value = db.read(txn2, "account:1")?;
//!     assert_eq!(value, Some(json!({"balance": 1000})));
//!     db.commit(txn2)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The [`Database`] facade is the entry point used by applications. It
//! wraps the transactional storage engine (write-ahead log, lock manager,
//! transaction registry, deep-merge, recovery) implemented in
//! `ledgerdb-durability`, `ledgerdb-concurrency`, and `ledgerdb-engine`.
//! Schema validation, cloud backup/restore, document caching, and
//! auto-transaction convenience wrappers are deliberately not part of this
//! crate — they are external collaborators that consume the engine API
//! surface re-exported here.

pub use ledgerdb_api::Database;
pub use ledgerdb_core::{Error, Result, TransactionId};
