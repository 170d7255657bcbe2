//! Loading and defaulting `<dbRoot>/ledgerdb.toml`.

use ledgerdb_core::Result;
use ledgerdb_engine::EngineConfig;
use std::fs;
use std::path::Path;

const CONFIG_FILE_NAME: &str = "ledgerdb.toml";

/// Load `ledgerdb.toml` from `data_dir`, writing a default file if one does
/// not yet exist. Fields absent from an existing file fall back to
/// [`EngineConfig::default`] (`#[serde(default)]` throughout), so adding a
/// new tunable never breaks an older data directory's config file.
pub(crate) fn load_or_init(data_dir: &Path) -> Result<EngineConfig> {
    let path = data_dir.join(CONFIG_FILE_NAME);

    if !path.exists() {
        let default = EngineConfig::default();
        let text = toml::to_string_pretty(&default)
            .expect("EngineConfig always serializes to TOML");
        fs::write(&path, text)?;
        tracing::debug!(path = %path.display(), "wrote default ledgerdb.toml");
        return Ok(default);
    }

    let text = fs::read_to_string(&path)?;
    let config: EngineConfig = toml::from_str(&text).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ledgerdb.toml unreadable, using defaults");
        EngineConfig::default()
    });
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_open_writes_default_config() {
        let dir = tempdir().unwrap();
        let config = load_or_init(dir.path()).unwrap();
        assert_eq!(config.lock_timeout_ms, 30_000);
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn second_open_reads_back_written_config() {
        let dir = tempdir().unwrap();
        load_or_init(dir.path()).unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "lock_timeout_ms = 5000\n",
        )
        .unwrap();
        let config = load_or_init(dir.path()).unwrap();
        assert_eq!(config.lock_timeout_ms, 5000);
        // Fields absent from the hand-edited file keep their defaults.
        assert_eq!(config.lock_queue_warn_threshold, 8);
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "not valid toml {{{").unwrap();
        let config = load_or_init(dir.path()).unwrap();
        assert_eq!(config.lock_timeout_ms, 30_000);
    }
}
