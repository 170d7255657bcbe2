//! On-disk key-file I/O: `<dbRoot>/<key>.json`, pretty-printed, written
//! atomically (write-temp-then-rename) so a crash mid-write never leaves a
//! partially written file for recovery to trip over.

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The path a document key maps to under `data_dir`.
pub(crate) fn key_path(data_dir: &Path, key: &str) -> PathBuf {
    data_dir.join(format!("{key}.json"))
}

/// Read a key's current on-disk value: `Value::Null` if the file is absent
/// or empty, the parsed value otherwise. Propagates a JSON parse error to
/// the caller (the "strict" read used by the read path).
pub(crate) fn read_strict(data_dir: &Path, key: &str) -> io::Result<Value> {
    let path = key_path(data_dir, key);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Value::Null),
        Err(e) => return Err(e),
    };
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Read a key's current on-disk value, tolerating a parse error by treating
/// it as absent (`Null`) rather than propagating — the "lenient" read used
/// by the write/delete paths, where a malformed file must not block a new
/// write from proceeding ("treated as empty object for merge
/// purposes").
pub(crate) fn read_lenient(data_dir: &Path, key: &str) -> Value {
    match read_strict(data_dir, key) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(key, error = %e, "on-disk document unreadable; treating as absent");
            Value::Null
        }
    }
}

/// Write `value` to `<key>.json`, creating the parent directory if needed.
/// Idempotent: writing the same content twice (Redo's requirement) is a
/// harmless no-op at the filesystem level.
pub(crate) fn write_key_file(data_dir: &Path, key: &str, value: &Value) -> io::Result<()> {
    let path = key_path(data_dir, key);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, &path)
}

/// Delete `<key>.json` if present; absent is tolerated (Redo's idempotence
/// requirement for DELETE).
pub(crate) fn delete_key_file(data_dir: &Path, key: &str) -> io::Result<()> {
    match fs::remove_file(key_path(data_dir, key)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
