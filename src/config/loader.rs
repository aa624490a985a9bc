//! Config file loading.
//!
//! The config lives in `llm-policy.yml` at the scanned root. A missing file
//! yields the defaults; a malformed file also yields the defaults (with a
//! warning) rather than aborting — the scanner is advisory and should never
//! fail a run over its own configuration.

use std::path::Path;

use crate::config::schema::ScanConfig;
use crate::error::Result;

/// Name of the config file resolved from the scanned root.
pub const CONFIG_FILE: &str = "llm-policy.yml";

/// Load the config for a scan rooted at `root`.
///
/// Resolution order: explicit `path` override, then `<root>/llm-policy.yml`,
/// then built-in defaults. Any read or parse failure falls back to defaults.
pub fn load_config(root: &Path, path: Option<&Path>) -> ScanConfig {
    let candidate = match path {
        Some(p) => p.to_path_buf(),
        None => root.join(CONFIG_FILE),
    };

    let contents = match std::fs::read_to_string(&candidate) {
        Ok(c) => c,
        Err(_) => return ScanConfig::default(),
    };

    match load_config_str(&contents) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(
                path = %candidate.display(),
                error = %e,
                "malformed config, falling back to defaults"
            );
            ScanConfig::default()
        }
    }
}

/// Parse a config from a YAML string.
pub fn load_config_str(contents: &str) -> Result<ScanConfig> {
    Ok(serde_yaml::from_str(contents)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load_config(dir.path(), None);
        assert!(cfg.custom_api_key_prefixes.is_empty());
        assert_eq!(cfg.secrets.max_findings, 20);
    }

    #[test]
    fn test_valid_file_loaded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "custom-api-key-prefixes: [\"acme_\"]\n",
        )
        .unwrap();
        let cfg = load_config(dir.path(), None);
        assert_eq!(cfg.custom_api_key_prefixes, vec!["acme_"]);
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{{not yaml").unwrap();
        let cfg = load_config(dir.path(), None);
        assert!(cfg.custom_api_key_prefixes.is_empty());
        assert!(cfg.policies.rate_limit);
    }

    #[test]
    fn test_explicit_path_override() {
        let dir = TempDir::new().unwrap();
        let alt = dir.path().join("alt.yml");
        std::fs::write(&alt, "rate-limit:\n  min-sleep-seconds: 3.0\n").unwrap();
        let cfg = load_config(dir.path(), Some(&alt));
        assert_eq!(cfg.rate_limit.min_sleep_seconds, 3.0);
    }

    #[test]
    fn test_load_config_str_rejects_bad_yaml() {
        assert!(load_config_str("a: [unclosed").is_err());
    }
}
