//! Shared types for ledgerdb: the closed error taxonomy, transaction
//! identifiers, key-safety validation, and the deep-merge function used to
//! compute a WRITE's after-image.
//!
//! Everything here is plain data and pure functions; the WAL, lock manager,
//! and storage engine live in their own crates and depend on this one.

#![warn(missing_docs)]

pub mod error;
pub mod key;
pub mod merge;
pub mod txn_id;

pub use error::{Error, Result};
pub use merge::deep_merge;
pub use txn_id::TransactionId;
