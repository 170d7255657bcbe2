//! Per-key two-phase locking with FIFO wait queues and timeout-based
//! deadlock handling.
//!
//! The manager is a small hand-written coordinator: one mutex guards the
//! whole lock table (the hot path is short), and a single condvar wakes
//! every waiter on any state change. Each waiter re-checks its own
//! `granted`/`aborted` flag on wakeup rather than racing on the shared
//! predicate, so a suspended `acquire` resumes exactly once.

use ledgerdb_core::{Error, Result};
use ledgerdb_core::TransactionId;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// The mode a lock is held or requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Multiple transactions may hold a shared lock concurrently.
    Shared,
    /// At most one transaction may hold an exclusive lock.
    Exclusive,
}

impl LockMode {
    fn name(self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

struct Waiter {
    id: u64,
    txn: TransactionId,
    mode: LockMode,
    granted: bool,
    aborted: bool,
}

struct KeyLock {
    mode: Option<LockMode>,
    holders: HashSet<TransactionId>,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

impl KeyLock {
    fn new() -> Self {
        KeyLock {
            mode: None,
            holders: HashSet::new(),
            waiters: VecDeque::new(),
            next_waiter_id: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.holders.is_empty() && self.waiters.is_empty()
    }
}

/// Diagnostic threshold above which a key's waiter queue is flagged, purely
/// for observability (no behavioral effect).
const DEFAULT_QUEUE_WARN_THRESHOLD: usize = 8;

/// The lock manager: one `KeyLock` per document key, created lazily on
/// first acquire and removed once both holders and waiters are empty.
pub struct LockManager {
    table: Mutex<HashMap<String, KeyLock>>,
    condvar: Condvar,
    timeout: Duration,
    queue_warn_threshold: usize,
}

impl LockManager {
    /// Create a manager with the given deadlock timeout.
    pub fn new(timeout: Duration) -> Self {
        Self::with_queue_warn_threshold(timeout, DEFAULT_QUEUE_WARN_THRESHOLD)
    }

    /// Create a manager with an explicit diagnostic queue-length threshold,
    /// e.g. from `ledgerdb.toml`'s `lock_queue_warn_threshold`.
    pub fn with_queue_warn_threshold(timeout: Duration, queue_warn_threshold: usize) -> Self {
        LockManager {
            table: Mutex::new(HashMap::new()),
            condvar: Condvar::new(),
            timeout,
            queue_warn_threshold,
        }
    }

    /// Acquire `key` in `mode` on behalf of `txn`, blocking until granted or
    /// failing with `LockTimeout` after the deadlock timeout elapses.
    pub fn acquire(&self, key: &str, txn: TransactionId, mode: LockMode) -> Result<()> {
        let mut table = self.table.lock();
        let mut entry = table
            .entry(key.to_string())
            .or_insert_with(KeyLock::new);

        if entry.holders.contains(&txn) {
            match entry.mode {
                Some(LockMode::Shared) if mode == LockMode::Shared => return Ok(()),
                Some(LockMode::Exclusive) => return Ok(()),
                Some(LockMode::Shared) if mode == LockMode::Exclusive => {
                    if entry.holders.len() == 1 {
                        entry.mode = Some(LockMode::Exclusive);
                        tracing::debug!(key, txn = %txn, "lock upgraded to exclusive");
                        return Ok(());
                    }
                    // Multiple shared holders: upgrade must wait, falls
                    // through to the queueing path below.
                }
                _ => {}
            }
        }

        let grant_immediately = match entry.mode {
            None => true,
            Some(LockMode::Shared) if mode == LockMode::Shared => true,
            _ => false,
        };

        if grant_immediately {
            entry.holders.insert(txn);
            entry.mode = Some(mode);
            tracing::debug!(key, txn = %txn, mode = mode.name(), "lock granted immediately");
            return Ok(());
        }

        let my_id = entry.next_waiter_id;
        entry.next_waiter_id += 1;
        entry.waiters.push_back(Waiter {
            id: my_id,
            txn,
            mode,
            granted: false,
            aborted: false,
        });

        if entry.waiters.len() > self.queue_warn_threshold {
            tracing::warn!(key, queue_len = entry.waiters.len(), "lock waiter queue is long");
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let my_pos = entry.waiters.iter().position(|w| w.id == my_id);
            match my_pos.and_then(|i| entry.waiters.get(i).map(|w| (i, w.granted, w.aborted))) {
                Some((i, true, _)) => {
                    entry.waiters.remove(i);
                    tracing::debug!(key, txn = %txn, mode = mode.name(), "lock granted from queue");
                    return Ok(());
                }
                Some((i, _, true)) => {
                    entry.waiters.remove(i);
                    return Err(Error::TransactionAborted(txn.0));
                }
                None => {
                    // Removed by releaseAll without a flag update; treat as aborted.
                    return Err(Error::TransactionAborted(txn.0));
                }
                _ => {}
            }

            let now = Instant::now();
            if now >= deadline {
                if let Some(i) = entry.waiters.iter().position(|w| w.id == my_id) {
                    entry.waiters.remove(i);
                }
                tracing::debug!(key, txn = %txn, mode = mode.name(), "lock acquire timed out");
                return Err(Error::LockTimeout {
                    key: key.to_string(),
                    txn: txn.0,
                    mode: mode.name(),
                });
            }

            let remaining = deadline - now;
            let result = self.condvar.wait_for(&mut table, remaining);
            entry = table
                .get_mut(key)
                .expect("key lock removed while a waiter was still queued");
            if result.timed_out() {
                continue;
            }
        }
    }

    /// Release a single hold of `key` by `txn` and drain the waiter queue
    /// if this was the last holder.
    pub fn release(&self, key: &str, txn: TransactionId) {
        let mut table = self.table.lock();
        let remove_key = {
            let entry = match table.get_mut(key) {
                Some(e) => e,
                None => return,
            };
            entry.holders.remove(&txn);
            if entry.holders.is_empty() {
                entry.mode = None;
                drain(entry);
            }
            tracing::debug!(key, txn = %txn, "lock released");
            entry.is_empty()
        };
        if remove_key {
            table.remove(key);
        }
        self.condvar.notify_all();
    }

    /// Release every lock held by `txn` and cancel every queued request of
    /// `txn`, failing each cancelled waiter with `TransactionAborted`.
    pub fn release_all(&self, txn: TransactionId) {
        let mut table = self.table.lock();
        let mut empty_keys = Vec::new();

        for (key, entry) in table.iter_mut() {
            let held = entry.holders.remove(&txn);
            if held && entry.holders.is_empty() {
                entry.mode = None;
                drain(entry);
            }
            for waiter in entry.waiters.iter_mut() {
                if waiter.txn == txn {
                    waiter.aborted = true;
                }
            }
            if entry.is_empty() {
                empty_keys.push(key.clone());
            }
        }
        for key in empty_keys {
            table.remove(&key);
        }
        tracing::debug!(txn = %txn, "released all locks");
        self.condvar.notify_all();
    }
}

/// Drain the waiter queue of a key whose holder set just became empty: if
/// the head waiter wants exclusive, grant only it; if shared, grant the
/// entire consecutive prefix of shared waiters.
fn drain(entry: &mut KeyLock) {
    let head_mode = match entry.waiters.front() {
        Some(w) => w.mode,
        None => return,
    };

    match head_mode {
        LockMode::Exclusive => {
            if let Some(w) = entry.waiters.front_mut() {
                w.granted = true;
                entry.holders.insert(w.txn);
                entry.mode = Some(LockMode::Exclusive);
            }
        }
        LockMode::Shared => {
            entry.mode = Some(LockMode::Shared);
            for w in entry.waiters.iter_mut() {
                if w.mode != LockMode::Shared {
                    break;
                }
                w.granted = true;
                entry.holders.insert(w.txn);
            }
        }
    }
}
