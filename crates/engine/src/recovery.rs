//! ARIES-style crash recovery: analysis, redo, undo (three passes over
//! the WAL at startup).

use crate::files::{delete_key_file, write_key_file};
use ledgerdb_core::Result;
use ledgerdb_durability::{Wal, WalOperation};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// Run recovery against `data_dir` using every entry currently in `wal`.
/// Idempotent: running this twice in a row produces the same on-disk state
/// as running it once, since Redo rewrites/deletes the same targets and
/// Undo, once applied, leaves no further uncommitted records to restore.
pub(crate) fn run(data_dir: &Path, wal: &Wal) -> Result<()> {
    let entries = wal.scan(None)?;

    // Analysis: partition transaction ids into committed / aborted.
    let mut committed: HashSet<String> = HashSet::new();
    let mut rolled_back: HashSet<String> = HashSet::new();
    for entry in &entries {
        match entry.operation {
            WalOperation::Commit => {
                committed.insert(entry.transaction_id.clone());
            }
            WalOperation::Rollback => {
                rolled_back.insert(entry.transaction_id.clone());
            }
            _ => {}
        }
    }
    rolled_back.retain(|txn| !committed.contains(txn));

    // Redo: forward LSN order, re-apply every committed WRITE/DELETE.
    let mut redo_count = 0usize;
    for entry in &entries {
        if !committed.contains(&entry.transaction_id) {
            continue;
        }
        let Some(key) = entry.key.as_deref() else {
            continue;
        };
        match entry.operation {
            WalOperation::Write => {
                let after = entry.after_image.clone().unwrap_or(Value::Null);
                write_key_file(data_dir, key, &after)?;
                redo_count += 1;
            }
            WalOperation::Delete => {
                delete_key_file(data_dir, key)?;
                redo_count += 1;
            }
            _ => {}
        }
    }

    // Undo: reverse LSN order, restore the before-image of every WRITE/
    // DELETE belonging to a transaction that is neither committed nor
    // explicitly rolled back (crashed mid-transaction).
    let mut undo_count = 0usize;
    for entry in entries.iter().rev() {
        if committed.contains(&entry.transaction_id) || rolled_back.contains(&entry.transaction_id) {
            continue;
        }
        let Some(key) = entry.key.as_deref() else {
            continue;
        };
        match entry.operation {
            WalOperation::Write | WalOperation::Delete => {
                let before = entry.before_image.clone().unwrap_or(Value::Null);
                if before.is_null() {
                    delete_key_file(data_dir, key)?;
                } else {
                    write_key_file(data_dir, key, &before)?;
                }
                undo_count += 1;
            }
            _ => {}
        }
    }

    tracing::debug!(
        redo = redo_count,
        undo = undo_count,
        committed = committed.len(),
        "crash recovery complete"
    );
    Ok(())
}
