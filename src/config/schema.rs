//! Configuration data structures for llmscan.
//!
//! Defines the `llm-policy.yml` format. Every field has a documented default;
//! the resolved config never mutates after loading. Unknown keys are ignored
//! by serde so third-party tooling can extend the file freely.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::Language;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration, resolved once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Extra secret prefixes to match in addition to the built-in set.
    #[serde(default, rename = "custom-api-key-prefixes")]
    pub custom_api_key_prefixes: Vec<String>,

    /// Glob patterns excluded from every engine, on top of the defaults.
    #[serde(default)]
    pub exclude_globs: Vec<String>,

    #[serde(default, rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,

    #[serde(default, rename = "input-sanitize")]
    pub input_sanitize: InputSanitizeConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Per-engine enable toggles.
    #[serde(default)]
    pub policies: PoliciesConfig,
}

// ---------------------------------------------------------------------------
// RateLimitConfig
// ---------------------------------------------------------------------------

/// Tuning for the rate-limit call-site analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Languages the analyzer runs on. Unrecognized names are ignored.
    #[serde(default = "default_rate_limit_languages")]
    pub languages: Vec<String>,

    /// Minimum acceptable sleep duration inside a throttled loop, in seconds.
    #[serde(default = "default_min_sleep_seconds", rename = "min-sleep-seconds")]
    pub min_sleep_seconds: f64,

    /// Cap on the number of detail lines in the report.
    #[serde(default = "default_flow_max_findings", rename = "max-findings")]
    pub max_findings: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            languages: default_rate_limit_languages(),
            min_sleep_seconds: default_min_sleep_seconds(),
            max_findings: default_flow_max_findings(),
        }
    }
}

impl RateLimitConfig {
    /// The enabled language set, dropping unrecognized entries.
    pub fn enabled_languages(&self) -> HashSet<Language> {
        parse_languages(&self.languages)
    }
}

// ---------------------------------------------------------------------------
// InputSanitizeConfig
// ---------------------------------------------------------------------------

/// Tuning for the taint-flow analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSanitizeConfig {
    /// Languages the analyzer runs on. Defaults to Python only — the
    /// textual fallback for other languages is noisy enough to be opt-in.
    #[serde(default = "default_input_sanitize_languages")]
    pub languages: Vec<String>,

    /// Cap on the number of detail lines in the report.
    #[serde(default = "default_flow_max_findings", rename = "max-findings")]
    pub max_findings: usize,
}

impl Default for InputSanitizeConfig {
    fn default() -> Self {
        Self {
            languages: default_input_sanitize_languages(),
            max_findings: default_flow_max_findings(),
        }
    }
}

impl InputSanitizeConfig {
    pub fn enabled_languages(&self) -> HashSet<Language> {
        parse_languages(&self.languages)
    }
}

// ---------------------------------------------------------------------------
// SecretsConfig
// ---------------------------------------------------------------------------

/// Tuning for the secret pattern matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Minimum candidate-tail length directly after a recognized prefix.
    #[serde(
        default = "default_min_prefix_tail_length",
        rename = "min-prefix-tail-length"
    )]
    pub min_prefix_tail_length: usize,

    /// Minimum length of a freestanding high-entropy token.
    #[serde(default = "default_min_token_length", rename = "min-token-length")]
    pub min_token_length: usize,

    /// Distinct-character ratio a freestanding token must exceed.
    #[serde(default = "default_min_distinct_ratio", rename = "min-distinct-ratio")]
    pub min_distinct_ratio: f64,

    /// Cap on the number of detail lines in the report.
    #[serde(default = "default_secrets_max_findings", rename = "max-findings")]
    pub max_findings: usize,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            min_prefix_tail_length: default_min_prefix_tail_length(),
            min_token_length: default_min_token_length(),
            min_distinct_ratio: default_min_distinct_ratio(),
            max_findings: default_secrets_max_findings(),
        }
    }
}

// ---------------------------------------------------------------------------
// PoliciesConfig
// ---------------------------------------------------------------------------

/// Per-engine enable toggles. Everything is on by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesConfig {
    #[serde(default = "default_true", rename = "api-key-security")]
    pub api_key_security: bool,

    #[serde(default = "default_true", rename = "rate-limit")]
    pub rate_limit: bool,

    #[serde(default = "default_true", rename = "input-sanitize")]
    pub input_sanitize: bool,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            api_key_security: true,
            rate_limit: true,
            input_sanitize: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_rate_limit_languages() -> Vec<String> {
    vec![
        "python".into(),
        "javascript".into(),
        "typescript".into(),
        "go".into(),
    ]
}

fn default_input_sanitize_languages() -> Vec<String> {
    vec!["python".into()]
}

fn default_min_sleep_seconds() -> f64 {
    1.0
}

fn default_flow_max_findings() -> usize {
    100
}

fn default_min_prefix_tail_length() -> usize {
    8
}

fn default_min_token_length() -> usize {
    32
}

fn default_min_distinct_ratio() -> f64 {
    0.5
}

fn default_secrets_max_findings() -> usize {
    20
}

fn parse_languages(names: &[String]) -> HashSet<Language> {
    names
        .iter()
        .filter_map(|s| Language::from_str_loose(s))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let cfg = ScanConfig::default();
        assert!(cfg.custom_api_key_prefixes.is_empty());
        assert!(cfg.exclude_globs.is_empty());
        assert_eq!(cfg.rate_limit.min_sleep_seconds, 1.0);
        assert_eq!(cfg.rate_limit.max_findings, 100);
        assert_eq!(cfg.input_sanitize.max_findings, 100);
        assert_eq!(cfg.secrets.min_prefix_tail_length, 8);
        assert_eq!(cfg.secrets.min_token_length, 32);
        assert_eq!(cfg.secrets.max_findings, 20);
        assert!(cfg.policies.api_key_security);
        assert!(cfg.policies.rate_limit);
        assert!(cfg.policies.input_sanitize);
    }

    #[test]
    fn test_default_language_sets() {
        let cfg = ScanConfig::default();
        let rate = cfg.rate_limit.enabled_languages();
        assert!(rate.contains(&Language::Python));
        assert!(rate.contains(&Language::JavaScript));
        assert!(rate.contains(&Language::TypeScript));
        assert!(rate.contains(&Language::Go));

        let taint = cfg.input_sanitize.enabled_languages();
        assert_eq!(taint.len(), 1);
        assert!(taint.contains(&Language::Python));
    }

    #[test]
    fn test_yaml_partial_config_keeps_defaults() {
        let yaml = r#"
custom-api-key-prefixes:
  - "acme_"
"#;
        let cfg: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.custom_api_key_prefixes, vec!["acme_"]);
        assert_eq!(cfg.rate_limit.min_sleep_seconds, 1.0);
        assert!(cfg.policies.rate_limit);
    }

    #[test]
    fn test_yaml_nested_sections() {
        let yaml = r#"
exclude_globs:
  - "**/generated/**"
rate-limit:
  min-sleep-seconds: 2.5
  languages: ["python"]
input-sanitize:
  languages: ["python", "javascript"]
  max-findings: 10
policies:
  input-sanitize: false
"#;
        let cfg: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.exclude_globs, vec!["**/generated/**"]);
        assert_eq!(cfg.rate_limit.min_sleep_seconds, 2.5);
        assert_eq!(cfg.rate_limit.enabled_languages().len(), 1);
        assert_eq!(cfg.input_sanitize.max_findings, 10);
        assert!(cfg
            .input_sanitize
            .enabled_languages()
            .contains(&Language::JavaScript));
        assert!(!cfg.policies.input_sanitize);
        // untouched sections keep defaults
        assert!(cfg.policies.api_key_security);
        assert_eq!(cfg.secrets.min_token_length, 32);
    }

    #[test]
    fn test_unrecognized_keys_ignored() {
        let yaml = r#"
future-option: 42
secrets:
  min-token-length: 24
"#;
        let cfg: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.secrets.min_token_length, 24);
    }

    #[test]
    fn test_unrecognized_language_names_dropped() {
        let yaml = r#"
rate-limit:
  languages: ["python", "cobol", "fortran"]
"#;
        let cfg: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        let langs = cfg.rate_limit.enabled_languages();
        assert_eq!(langs.len(), 1);
        assert!(langs.contains(&Language::Python));
    }

    #[test]
    fn test_serde_yaml_roundtrip() {
        let cfg = ScanConfig {
            custom_api_key_prefixes: vec!["acme_".into()],
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let back: ScanConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.custom_api_key_prefixes, vec!["acme_"]);
    }
}
