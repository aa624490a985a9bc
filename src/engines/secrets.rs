//! Secret pattern matcher — flags lines that likely expose a credential.
//!
//! Two detections run per line, first qualifying match wins:
//!
//! 1. **Prefix-anchored**: a known provider prefix (built-in set union the
//!    configured custom prefixes, longest-first) followed by a candidate tail
//!    of key-alphabet characters. Tails that are model-name-shaped
//!    (`claude-3-opus`), path/URL-shaped, or too short are rejected.
//! 2. **Freestanding high-entropy**: a long run of key-alphabet characters
//!    with mixed character classes and a high distinct-character ratio,
//!    rejected near URL/path context.
//!
//! Comment lines are skipped, config-shaped lines are held to stricter
//! thresholds, and files with config-like extensions stricter still.

use std::path::Path;
use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;

use crate::config::ScanConfig;
use crate::types::{Finding, FindingCategory};
use crate::walker::{self, ExclusionSet};

// ---------------------------------------------------------------------------
// Built-in prefixes
// ---------------------------------------------------------------------------

/// Known provider prefixes. Model-id prefixes are included on purpose: a
/// model id is harmless by itself, but a credential pasted next to one often
/// shares its prefix, and the tail checks below separate the two.
const DEFAULT_PREFIXES: &[&str] = &[
    "sk-",           // OpenAI
    "sk-ant-",       // Anthropic
    "hf_",           // Hugging Face
    "AKIA",          // AWS access key id
    "azure_openai_", // Azure env var
    "cohere-",
    "mistral-",
    "claude-",
    "gpt-4",
    "llama-3",
    "phi-2",
];

/// Characters that can appear in a credential token.
fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '_' | '-')
}

/// Identifier characters that must not immediately precede a prefix match.
fn is_boundary_violation(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

// ---------------------------------------------------------------------------
// SecretMatcher
// ---------------------------------------------------------------------------

/// Compiled matcher, resolved once per configuration load.
pub struct SecretMatcher {
    prefix_re: Regex,
    min_prefix_tail: usize,
    min_token_len: usize,
    min_distinct_ratio: f64,
}

impl SecretMatcher {
    /// Build from the built-in prefixes union `custom-api-key-prefixes`.
    /// Longest prefix first so a short prefix never masks a longer one.
    pub fn new(cfg: &ScanConfig) -> Self {
        let mut prefixes: Vec<&str> = DEFAULT_PREFIXES.to_vec();
        prefixes.extend(cfg.custom_api_key_prefixes.iter().map(String::as_str));
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        prefixes.dedup();

        let alternation = prefixes
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        // static prefixes plus escaped user strings, always a valid pattern
        let prefix_re = Regex::new(&format!("(?i)({alternation})"))
            .expect("escaped prefix alternation must compile");

        SecretMatcher {
            prefix_re,
            min_prefix_tail: cfg.secrets.min_prefix_tail_length,
            min_token_len: cfg.secrets.min_token_length,
            min_distinct_ratio: cfg.secrets.min_distinct_ratio,
        }
    }

    /// Scan one file's text. `config_like` raises both length thresholds,
    /// since config formats are alphanumeric-dense by nature.
    pub fn scan_source(&self, rel_path: &str, source: &str, config_like: bool) -> Vec<Finding> {
        let (prefix_min, token_min) = if config_like {
            (self.min_prefix_tail * 2, self.min_token_len + 8)
        } else {
            (self.min_prefix_tail, self.min_token_len)
        };

        let mut findings = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            if is_comment_or_pattern(line) {
                continue;
            }
            let hit = self
                .match_prefix(line, prefix_min)
                .or_else(|| self.match_freestanding(line, token_min));
            if let Some(tag) = hit {
                findings.push(
                    Finding::new(rel_path, Some(idx + 1), FindingCategory::Secret, line)
                        .with_tag(tag),
                );
            }
        }
        findings
    }

    /// Prefix-anchored detection. Returns the matched prefix on a hit.
    fn match_prefix(&self, line: &str, min_tail: usize) -> Option<String> {
        for m in self.prefix_re.find_iter(line) {
            // Reject matches embedded in a longer identifier.
            if line[..m.start()]
                .chars()
                .next_back()
                .is_some_and(is_boundary_violation)
            {
                continue;
            }
            // URL/path context right before the prefix.
            let before = window_before(line, m.start());
            if before.contains("://") || before.contains('/') {
                continue;
            }

            let run = key_run(line, m.start());
            if run.len() < m.len() {
                // custom prefix containing non-key characters
                continue;
            }
            let tail = &run[m.len()..];
            if tail.chars().count() < min_tail {
                continue;
            }
            if run.contains('/') || is_model_shaped(run) || is_version_shaped(tail) {
                continue;
            }
            return Some(m.as_str().to_string());
        }
        None
    }

    /// Freestanding high-entropy token detection.
    fn match_freestanding(&self, line: &str, min_len: usize) -> Option<String> {
        // Config-shaped lines are exempt unless the token is unusually long.
        let config_line = is_structured_config_line(line);

        for (start, run) in key_runs(line) {
            if run.chars().count() < min_len {
                continue;
            }
            if config_line && run.chars().count() < min_len + 8 {
                continue;
            }
            // Path/URL shaped or adjacent to URL/path context.
            if run.contains('/') {
                continue;
            }
            let before = window_before(line, start);
            if before.contains(':') || before.contains('/') {
                continue;
            }
            if !looks_high_entropy(run, self.min_distinct_ratio) {
                continue;
            }
            return Some("high-entropy".to_string());
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Public scan entry point
// ---------------------------------------------------------------------------

/// Scan every candidate file under `root` for exposed credentials.
/// Returns all findings, sorted by (path, line); the aggregator caps them.
pub fn scan(root: &Path, cfg: &ScanConfig) -> Vec<Finding> {
    let matcher = SecretMatcher::new(cfg);
    let exclusions = ExclusionSet::from_config(cfg);
    let files = walker::collect_candidates(root, &exclusions);

    let mut findings: Vec<Finding> = files
        .par_iter()
        .filter_map(|f| {
            let source = walker::read_lossy(&f.abs)?;
            Some(matcher.scan_source(&f.rel, &source, walker::is_config_like(&f.rel)))
        })
        .flatten()
        .collect();
    findings.sort();
    findings
}

// ---------------------------------------------------------------------------
// Line & token helpers
// ---------------------------------------------------------------------------

/// Comment lines, blank lines, and ignore-pattern lines (`*`/`!` wildcards
/// in pattern files) never hold live credentials.
fn is_comment_or_pattern(line: &str) -> bool {
    let stripped = line.trim();
    stripped.is_empty()
        || stripped.starts_with('#')
        || stripped.starts_with('*')
        || stripped.starts_with('!')
}

/// `key = value`, `key:`, or `[section]` lines.
fn is_structured_config_line(line: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\s*(\[[^\]]+\]\s*$|[A-Za-z_][A-Za-z0-9_.\-]*\s*[:=])").unwrap()
    });
    re.is_match(line)
}

/// Up to 10 characters preceding byte offset `at`.
fn window_before(line: &str, at: usize) -> &str {
    let mut start = at.saturating_sub(10);
    while start > 0 && !line.is_char_boundary(start) {
        start -= 1;
    }
    &line[start..at]
}

/// The maximal run of key-alphabet characters starting at byte offset `at`.
fn key_run(line: &str, at: usize) -> &str {
    let rest = &line[at..];
    let end = rest
        .char_indices()
        .find(|(_, c)| !is_key_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    &rest[..end]
}

/// All maximal runs of key-alphabet characters with their byte offsets.
fn key_runs(line: &str) -> Vec<(usize, &str)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in line.char_indices() {
        match (is_key_char(c), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, &line[s..i]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, &line[s..]));
    }
    runs
}

/// Model-name convention: dash-separated short alphanumeric segments with at
/// least one digit-led segment (`claude-3-opus`, `gpt-4`, `mistral-7b-instruct`).
fn is_model_shaped(token: &str) -> bool {
    let segments: Vec<&str> = token.split('-').collect();
    if segments.len() < 2 {
        return false;
    }
    let mut has_numeric_segment = false;
    for seg in &segments {
        if seg.is_empty() || seg.chars().count() > 12 {
            return false;
        }
        if !seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '.') {
            return false;
        }
        if seg.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            has_numeric_segment = true;
        }
    }
    has_numeric_segment
}

/// Package-version tails like `1.2.3` or `v2`.
fn is_version_shaped(tail: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^v?\d+(\.\d+)*$").unwrap());
    re.is_match(tail)
}

/// Crude entropy proxy: at least two of {upper, lower, digit} and a
/// distinct-character ratio above the configured floor.
fn looks_high_entropy(token: &str, min_distinct_ratio: f64) -> bool {
    let has_upper = token.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = token.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = token.chars().any(|c| c.is_ascii_digit());
    let classes = [has_upper, has_lower, has_digit]
        .iter()
        .filter(|b| **b)
        .count();
    if classes < 2 {
        return false;
    }
    let len = token.chars().count();
    let distinct = token.chars().collect::<std::collections::HashSet<_>>().len();
    distinct as f64 / len as f64 > min_distinct_ratio
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
