//! The write-ahead log: an append-only, checksummed, crash-safe record of
//! every state-changing operation.
//!
//! All mutations to the log's in-memory state (the next-LSN counter and the
//! unflushed buffer) are serialized behind a single short-critical-section
//! mutex, per the "small hand-written coordinator" guidance — no WAL state
//! is ever touched outside `inner.lock()`.

use crate::checksum::digest_hex;
use crate::config::WalConfig;
use crate::entry::{LogEntry, WalOperation};
use ledgerdb_core::Result;
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const SYSTEM_TXN: &str = "SYSTEM";

struct WalInner {
    file: File,
    buffer: Vec<LogEntry>,
    next_lsn: u64,
    config: WalConfig,
}

/// The active write-ahead log for one data directory.
pub struct Wal {
    path: PathBuf,
    inner: Mutex<WalInner>,
}

impl Wal {
    /// Open (or create) the WAL at `path`, performing the recovery scan
    /// that seeds the next-LSN counter: lines that fail checksum
    /// verification are skipped, per the corrupt-entry policy.
    pub fn open(path: impl AsRef<Path>, config: WalConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut max_lsn: u64 = 0;
        if path.exists() {
            let file = File::open(&path)?;
            for line in BufReader::new(file).lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(_) => break,
                };
                if let Some(entry) = parse_and_verify(&line) {
                    max_lsn = max_lsn.max(entry.lsn);
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        tracing::debug!(next_lsn = max_lsn + 1, path = %path.display(), "WAL opened");

        Ok(Wal {
            path,
            inner: Mutex::new(WalInner {
                file,
                buffer: Vec::new(),
                next_lsn: max_lsn + 1,
                config,
            }),
        })
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry without a caller-assigned LSN; the WAL assigns the
    /// next one atomically and returns it.
    pub fn append(
        &self,
        transaction_id: &str,
        operation: WalOperation,
        key: Option<String>,
        before_image: Option<Value>,
        after_image: Option<Value>,
    ) -> Result<u64> {
        let mut inner = self.inner.lock();
        let lsn = inner.next_lsn;
        inner.next_lsn += 1;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut entry = LogEntry {
            lsn,
            transaction_id: transaction_id.to_string(),
            operation,
            key,
            before_image,
            after_image,
            timestamp,
            checksum: String::new(),
        };
        entry.checksum = digest_hex(&entry.canonical_payload());

        tracing::debug!(lsn, ?operation, txn = transaction_id, "WAL append");

        let force = matches!(operation, WalOperation::Commit | WalOperation::Rollback);
        let threshold = inner.config.buffer_threshold;
        inner.buffer.push(entry);

        if force || inner.buffer.len() >= threshold {
            flush_locked(&mut inner, &self.path)?;
        }

        Ok(lsn)
    }

    /// Force all buffered entries to stable storage. This is the sole
    /// durability boundary the engine relies on for COMMIT/ROLLBACK.
    pub fn force_flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        flush_locked(&mut inner, &self.path)
    }

    /// Return every entry with `lsn >= from_lsn` (default: all), merging
    /// the on-disk log with any still-buffered entries, checksum-verified
    /// and sorted by LSN.
    pub fn scan(&self, from_lsn: Option<u64>) -> Result<Vec<LogEntry>> {
        let inner = self.inner.lock();
        let mut entries = Vec::new();

        if self.path.exists() {
            let file = File::open(&self.path)?;
            for line in BufReader::new(file).lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(_) => break,
                };
                if let Some(entry) = parse_and_verify(&line) {
                    entries.push(entry);
                } else if !line.trim().is_empty() {
                    tracing::warn!("skipping corrupt WAL line during scan");
                }
            }
        }

        entries.extend(inner.buffer.iter().cloned());
        entries.sort_by_key(|e| e.lsn);

        if let Some(from) = from_lsn {
            entries.retain(|e| e.lsn >= from);
        }

        Ok(entries)
    }

    /// Remove a fully-committed transaction's non-COMMIT records from the
    /// active log. Best-effort: any failure is swallowed with a warning,
    /// since trim is an optimization, not a correctness requirement.
    pub fn trim_committed_transaction(&self, transaction_id: &str) {
        if let Err(e) = self.try_trim(transaction_id) {
            tracing::warn!(txn = transaction_id, error = %e, "WAL trim failed");
        }
    }

    fn try_trim(&self, transaction_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        flush_locked(&mut inner, &self.path)?;

        if !self.path.exists() {
            return Ok(());
        }

        let file = File::open(&self.path)?;
        let mut kept_lines = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => break,
            };
            match parse_and_verify(&line) {
                None => kept_lines.push(line),
                Some(entry) => {
                    let belongs_to_txn = entry.transaction_id == transaction_id;
                    let is_commit_marker =
                        belongs_to_txn && matches!(entry.operation, WalOperation::Commit);
                    if !belongs_to_txn || is_commit_marker {
                        kept_lines.push(line);
                    }
                }
            }
        }

        let tmp_path = self.path.with_extension("trim.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for line in &kept_lines {
                writeln!(tmp, "{}", line)?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        inner.file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        Ok(())
    }

    /// Append a CHECKPOINT record (owned by the synthetic `SYSTEM`
    /// transaction) and force a flush. Purely an optimization marker; it
    /// never changes recovery semantics.
    pub fn checkpoint(&self) -> Result<()> {
        self.append(SYSTEM_TXN, WalOperation::Checkpoint, None, None, None)?;
        self.force_flush()
    }
}

fn flush_locked(inner: &mut WalInner, path: &Path) -> Result<()> {
    if !inner.buffer.is_empty() {
        for entry in inner.buffer.drain(..) {
            let line = serde_json::to_string(&entry)?;
            writeln!(inner.file, "{}", line)?;
        }
        inner.file.sync_all()?;
    }

    maybe_rotate(inner, path);
    Ok(())
}

/// Best-effort rotation: rename the active log with a timestamp suffix,
/// reopen a fresh empty log, and append a CHECKPOINT marker. Failure here
/// is logged but non-fatal, matching the WAL's rotation contract.
fn maybe_rotate(inner: &mut WalInner, path: &Path) {
    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return,
    };
    if size < inner.config.rotation_threshold_bytes {
        return;
    }

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let archive = path.with_file_name(format!(
        "{}.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or(".wal"),
        timestamp
    ));

    if let Err(e) = fs::rename(path, &archive) {
        tracing::warn!(error = %e, "WAL rotation rename failed");
        return;
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => inner.file = file,
        Err(e) => {
            tracing::warn!(error = %e, "WAL rotation could not reopen active log");
            return;
        }
    }

    tracing::debug!(archive = %archive.display(), "WAL rotated");

    let lsn = inner.next_lsn;
    inner.next_lsn += 1;
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let mut entry = LogEntry {
        lsn,
        transaction_id: SYSTEM_TXN.to_string(),
        operation: WalOperation::Checkpoint,
        key: None,
        before_image: None,
        after_image: None,
        timestamp: timestamp_ms,
        checksum: String::new(),
    };
    entry.checksum = digest_hex(&entry.canonical_payload());
    if let Ok(line) = serde_json::to_string(&entry) {
        let _ = writeln!(inner.file, "{}", line);
        let _ = inner.file.sync_all();
    }
}

fn parse_and_verify(line: &str) -> Option<LogEntry> {
    if line.trim().is_empty() {
        return None;
    }
    let entry: LogEntry = serde_json::from_str(line).ok()?;
    let expected = digest_hex(&entry.canonical_payload());
    if expected == entry.checksum {
        Some(entry)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &Path, config: WalConfig) -> Wal {
        Wal::open(dir.join(".wal"), config).unwrap()
    }

    #[test]
    fn empty_wal_starts_lsn_at_one() {
        let dir = tempdir().unwrap();
        let wal = open(dir.path(), WalConfig::default());
        let lsn = wal
            .append("t1", WalOperation::Begin, None, None, None)
            .unwrap();
        assert_eq!(lsn, 1);
    }

    #[test]
    fn lsns_are_monotone() {
        let dir = tempdir().unwrap();
        let wal = open(dir.path(), WalConfig::default());
        let a = wal.append("t1", WalOperation::Begin, None, None, None).unwrap();
        let b = wal.append("t1", WalOperation::Commit, None, None, None).unwrap();
        assert!(b > a);
    }

    #[test]
    fn commit_forces_flush_to_disk() {
        let dir = tempdir().unwrap();
        let wal = open(dir.path(), WalConfig::default().with_buffer_threshold(1000));
        wal.append("t1", WalOperation::Begin, None, None, None).unwrap();
        wal.append("t1", WalOperation::Commit, None, None, None).unwrap();
        let contents = fs::read_to_string(dir.path().join(".wal")).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn scan_merges_buffer_and_disk() {
        let dir = tempdir().unwrap();
        let wal = open(dir.path(), WalConfig::default().with_buffer_threshold(1000));
        wal.append("t1", WalOperation::Begin, None, None, None).unwrap();
        wal.append("t1", WalOperation::Commit, None, None, None).unwrap();
        wal.append("t2", WalOperation::Begin, None, None, None).unwrap();
        let entries = wal.scan(None).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.windows(2).all(|w| w[0].lsn < w[1].lsn));
    }

    proptest::proptest! {
        #[test]
        fn lsns_are_always_strictly_increasing_by_one(ops in proptest::collection::vec(0u8..3, 1..50)) {
            let dir = tempdir().unwrap();
            let wal = open(dir.path(), WalConfig::default().with_buffer_threshold(1000));
            let mut expected = 1u64;
            for op in ops {
                let operation = match op {
                    0 => WalOperation::Begin,
                    1 => WalOperation::Write,
                    _ => WalOperation::Commit,
                };
                let lsn = wal.append("t1", operation, None, None, None).unwrap();
                assert_eq!(lsn, expected);
                expected += 1;
            }
        }
    }

    #[test]
    fn scan_from_lsn_filters() {
        let dir = tempdir().unwrap();
        let wal = open(dir.path(), WalConfig::default());
        wal.append("t1", WalOperation::Begin, None, None, None).unwrap();
        wal.append("t1", WalOperation::Commit, None, None, None).unwrap();
        let entries = wal.scan(Some(2)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].lsn, 2);
    }

    #[test]
    fn reopen_resumes_lsn_counter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".wal");
        {
            let wal = Wal::open(&path, WalConfig::default()).unwrap();
            wal.append("t1", WalOperation::Begin, None, None, None).unwrap();
            wal.append("t1", WalOperation::Commit, None, None, None).unwrap();
        }
        let wal = Wal::open(&path, WalConfig::default()).unwrap();
        let lsn = wal.append("t2", WalOperation::Begin, None, None, None).unwrap();
        assert_eq!(lsn, 3);
    }

    #[test]
    fn corrupt_trailing_line_is_ignored_on_scan() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".wal");
        {
            let wal = Wal::open(&path, WalConfig::default()).unwrap();
            wal.append("t1", WalOperation::Begin, None, None, None).unwrap();
            wal.append("t1", WalOperation::Commit, None, None, None).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();

        let wal = Wal::open(&path, WalConfig::default()).unwrap();
        let entries = wal.scan(None).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn trim_retains_only_commit_marker() {
        let dir = tempdir().unwrap();
        let wal = open(dir.path(), WalConfig::default().with_buffer_threshold(1000));
        wal.append("t1", WalOperation::Begin, None, None, None).unwrap();
        wal.append(
            "t1",
            WalOperation::Write,
            Some("k".to_string()),
            Some(Value::Null),
            Some(serde_json::json!({"a": 1})),
        )
        .unwrap();
        wal.append("t1", WalOperation::Commit, None, None, None).unwrap();
        wal.trim_committed_transaction("t1");

        let entries = wal.scan(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, WalOperation::Commit);
    }

    #[test]
    fn checkpoint_appends_system_entry() {
        let dir = tempdir().unwrap();
        let wal = open(dir.path(), WalConfig::default());
        wal.checkpoint().unwrap();
        let entries = wal.scan(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transaction_id, "SYSTEM");
        assert_eq!(entries[0].operation, WalOperation::Checkpoint);
    }
}
