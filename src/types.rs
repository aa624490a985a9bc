//! Core domain types for llmscan.
//!
//! The finding model shared by all three detection engines, plus the source
//! language enumeration used by the taint and rate-limit analyzers.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Source languages the flow analyzers understand.
///
/// Python gets full syntax-tree analysis; the others fall back to textual
/// heuristics (see the engine modules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
}

impl Language {
    /// Map a file extension (including the dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".py" => Some(Self::Python),
            ".js" | ".mjs" | ".cjs" => Some(Self::JavaScript),
            ".ts" | ".tsx" => Some(Self::TypeScript),
            ".go" => Some(Self::Go),
            _ => None,
        }
    }

    /// Detect the language for a file path based on its extension.
    pub fn from_path(path: &str) -> Option<Self> {
        std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Self::from_extension(&format!(".{e}")))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
        }
    }

    /// Parse from a string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Some(Self::Python),
            "javascript" | "js" => Some(Self::JavaScript),
            "typescript" | "ts" => Some(Self::TypeScript),
            "go" | "golang" => Some(Self::Go),
            _ => None,
        }
    }

    /// Whether a full syntax tree is available for this language.
    ///
    /// Languages without one are handled by the engines' textual fallbacks.
    pub fn has_syntax_tree(&self) -> bool {
        matches!(self, Self::Python)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FindingCategory
// ---------------------------------------------------------------------------

/// Category of a reported issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingCategory {
    /// A credential-like token exposed in source.
    Secret,
    /// Untrusted data reaching an LLM call without a recognized sanitizer.
    UnsanitizedInput,
    /// A string literal matching a prompt-injection phrase.
    SuspiciousContent,
    /// An LLM call inside a loop with no throttling call.
    MissingRateLimit,
    /// A throttling call whose duration is below the configured minimum.
    SleepTooShort,
    /// A file that claimed a parseable language but could not be parsed.
    ParseFailure,
}

impl std::fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Secret => "secret",
            Self::UnsanitizedInput => "unsanitized-input",
            Self::SuspiciousContent => "suspicious-content",
            Self::MissingRateLimit => "missing-rate-limit",
            Self::SleepTooShort => "sleep-too-short",
            Self::ParseFailure => "parse-failure",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity of a finding. The engines only classify; whether a category
/// gates pass/fail is the calling orchestrator's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Advisory,
    Blocking,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Advisory => write!(f, "advisory"),
            Self::Blocking => write!(f, "blocking"),
        }
    }
}

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

/// Maximum excerpt length carried by a finding.
pub const MAX_EXCERPT_LEN: usize = 120;

/// One reported issue. Immutable once created.
///
/// Field order matters: the derived `Ord` sorts by (path, line, category, ...)
/// so reports are reproducible regardless of traversal or scheduling order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Finding {
    /// Relative, slash-normalized file path.
    pub path: String,
    /// 1-based line number; `None` for file-level findings.
    pub line: Option<usize>,
    pub category: FindingCategory,
    pub severity: Severity,
    /// Truncated source excerpt or message (≤ [`MAX_EXCERPT_LEN`] chars).
    pub excerpt: String,
    /// Optional explanatory tag (e.g. the callee that triggered the check).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Finding {
    pub fn new(
        path: impl Into<String>,
        line: Option<usize>,
        category: FindingCategory,
        excerpt: &str,
    ) -> Self {
        Finding {
            path: path.into(),
            line,
            category,
            severity: Severity::Advisory,
            excerpt: truncate_excerpt(excerpt),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Render the human-readable detail line: `path:line: excerpt`, or
    /// `path: excerpt` for file-level findings.
    pub fn detail(&self) -> String {
        match self.line {
            Some(n) => format!("{}:{}: {}", self.path, n, self.excerpt),
            None => format!("{}: {}", self.path, self.excerpt),
        }
    }
}

/// Truncate to [`MAX_EXCERPT_LEN`] characters on a char boundary.
fn truncate_excerpt(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= MAX_EXCERPT_LEN {
        return trimmed.to_string();
    }
    trimmed.chars().take(MAX_EXCERPT_LEN).collect()
}

/// Normalize a relative path to forward slashes.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
