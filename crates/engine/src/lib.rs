//! The transactional storage engine: orchestrates the write-ahead log, the
//! lock manager, and the transaction registry against on-disk key files,
//! and drives ARIES-style crash recovery at open.
//!
//! This crate is the CORE of ledgerdb; `ledgerdb-api` wraps [`StorageEngine`]
//! in a thin application-facing facade and owns `ledgerdb.toml` loading.

#![warn(missing_docs)]

mod config;
mod engine;
mod files;
mod recovery;

pub use config::EngineConfig;
pub use engine::StorageEngine;
