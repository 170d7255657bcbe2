//! Key-safety validation, shared by the engine and by external schema
//! validators so both enforce the same rule (a schema validator consumes
//! a patch prior to `write`, but key shape is the engine's call).
//!
//! A key is a non-empty string that does not contain `/`, `\`, or the
//! substring `..`. These characters are rejected rather than escaped
//! because a document key maps directly onto a filename under the data
//! directory (`<dbRoot>/<key>.json`).

use crate::error::Error;

/// Validate a document key against the key-safety rules.
///
/// # Examples
///
/// ```
/// use ledgerdb_core::key::validate;
///
/// assert!(validate("account:1").is_ok());
/// assert!(validate("").is_err());
/// assert!(validate("a/b").is_err());
/// assert!(validate("../escape").is_err());
/// ```
pub fn validate(key: &str) -> Result<(), Error> {
    if key.is_empty() {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key cannot be empty".to_string(),
        });
    }
    if key.contains('/') || key.contains('\\') {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key cannot contain '/' or '\\'".to_string(),
        });
    }
    if key.contains("..") {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "key cannot contain '..'".to_string(),
        });
    }
    Ok(())
}
