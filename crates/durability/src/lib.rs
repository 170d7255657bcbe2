//! The write-ahead log: entry encoding, checksums, tuning, and the append/
//! scan/trim contract the storage engine builds crash recovery on top of.

#![warn(missing_docs)]

pub mod checksum;
pub mod config;
pub mod entry;
pub mod wal;

pub use config::WalConfig;
pub use entry::{LogEntry, WalOperation};
pub use wal::Wal;
