//! File-tree traversal and exclusion.
//!
//! All three engines share this substrate: it decides which files participate
//! in a scan at all. A path is dropped when it matches an exclusion glob or
//! its base name sits on the fixed ignore list; oversized files are dropped
//! as a hardening measure. Traversal is pure — per-file I/O errors are
//! skipped, never fatal, and a fresh call re-walks the tree.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::config::ScanConfig;
use crate::types::normalize_path;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Skip files larger than 2 MB (generated files, minified bundles, etc.)
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Globs excluded on every run: VCS metadata, caches, build output,
/// binary/media formats, prose, and the tool's own config file.
const DEFAULT_GLOBS: &[&str] = &[
    "**/.git/**",
    "**/.hg/**",
    "**/.svn/**",
    "**/__pycache__/**",
    "**/node_modules/**",
    "**/target/**",
    "**/vendor/**",
    "**/build/**",
    "**/dist/**",
    "**/.github/**",
    "**/*.pyc",
    "**/*.class",
    "**/*.o",
    "**/*.so",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.ico",
    "**/*.pdf",
    "**/*.md",
    "**/*.rst",
    "**/llm-policy.yml",
];

/// Base names never scanned: manifests and lockfiles whose contents are
/// dependency noise, plus VCS dotfiles.
const IGNORED_BASENAMES: &[&str] = &[
    ".gitattributes",
    ".gitignore",
    "requirements.txt",
    "poetry.lock",
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "Cargo.lock",
    "go.sum",
];

/// Extensions the secret matcher holds to stricter thresholds — config
/// formats are alphanumeric-dense without necessarily containing secrets.
const CONFIG_LIKE_EXTENSIONS: &[&str] =
    &["yml", "yaml", "toml", "ini", "cfg", "conf", "env", "properties"];

// ---------------------------------------------------------------------------
// ExclusionSet
// ---------------------------------------------------------------------------

/// Compiled glob exclusions: the defaults plus any configured patterns.
pub struct ExclusionSet {
    globs: GlobSet,
}

impl ExclusionSet {
    /// Build from the defaults plus `cfg.exclude_globs`. Invalid user
    /// patterns are skipped with a warning rather than failing the run.
    pub fn from_config(cfg: &ScanConfig) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_GLOBS {
            // default patterns are static and known-valid
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        for pattern in &cfg.exclude_globs {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "skipping invalid exclusion glob");
                }
            }
        }
        let globs = builder.build().unwrap_or_else(|_| GlobSet::empty());
        ExclusionSet { globs }
    }

    /// Whether a slash-normalized relative path is excluded.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        if self.globs.is_match(rel_path) {
            return true;
        }
        let base = rel_path.rsplit('/').next().unwrap_or(rel_path);
        IGNORED_BASENAMES.contains(&base)
    }
}

// ---------------------------------------------------------------------------
// Candidate files
// ---------------------------------------------------------------------------

/// A file that passed the exclusion filter.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Absolute path on disk.
    pub abs: PathBuf,
    /// Path relative to the scan root, slash-normalized.
    pub rel: String,
}

/// Walk `root` and return every candidate file.
///
/// Standard ignore-file filtering is off: dotfiles like `.env` are prime
/// territory for leaked credentials, and a repo's own `.gitignore` must not
/// hide files from a security scan. Exclusion is governed entirely by
/// [`ExclusionSet`].
pub fn collect_candidates(root: &Path, exclusions: &ExclusionSet) -> Vec<CandidateFile> {
    let walker = WalkBuilder::new(root).standard_filters(false).build();

    let mut files = Vec::new();
    for entry in walker.flatten() {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let rel = match path.strip_prefix(root) {
            Ok(r) => normalize_path(&r.to_string_lossy()),
            Err(_) => continue,
        };
        if exclusions.is_excluded(&rel) {
            continue;
        }
        match std::fs::metadata(path) {
            Ok(m) if m.len() <= MAX_FILE_SIZE => {}
            _ => continue,
        }
        files.push(CandidateFile {
            abs: path.to_path_buf(),
            rel,
        });
    }
    files
}

/// Whether a path's extension belongs to the "likely configuration" set.
pub fn is_config_like(rel_path: &str) -> bool {
    Path::new(rel_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| CONFIG_LIKE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read a file as text, replacing invalid UTF-8 rather than failing.
/// Returns `None` on I/O errors — the caller skips the file.
pub fn read_lossy(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "skipping unreadable file");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rels(root: &Path, exclusions: &ExclusionSet) -> Vec<String> {
        let mut v: Vec<String> = collect_candidates(root, exclusions)
            .into_iter()
            .map(|f| f.rel)
            .collect();
        v.sort();
        v
    }

    #[test]
    fn test_collects_source_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();

        let excl = ExclusionSet::from_config(&ScanConfig::default());
        assert_eq!(rels(dir.path(), &excl), vec!["app.py", "main.go"]);
    }

    #[test]
    fn test_default_globs_exclude_git_and_caches() {
        let dir = TempDir::new().unwrap();
        for sub in [".git", "__pycache__", "node_modules"] {
            let d = dir.path().join(sub);
            std::fs::create_dir_all(&d).unwrap();
            std::fs::write(d.join("payload.py"), "secret = 1\n").unwrap();
        }
        std::fs::write(dir.path().join("kept.py"), "x = 1\n").unwrap();

        let excl = ExclusionSet::from_config(&ScanConfig::default());
        assert_eq!(rels(dir.path(), &excl), vec!["kept.py"]);
    }

    #[test]
    fn test_ignored_basenames() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("poetry.lock"), "sk-fake\n").unwrap();
        std::fs::write(dir.path().join("package-lock.json"), "{}\n").unwrap();
        std::fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();

        let excl = ExclusionSet::from_config(&ScanConfig::default());
        assert_eq!(rels(dir.path(), &excl), vec!["app.py"]);
    }

    #[test]
    fn test_custom_glob_excludes() {
        let dir = TempDir::new().unwrap();
        let gen = dir.path().join("generated");
        std::fs::create_dir_all(&gen).unwrap();
        std::fs::write(gen.join("out.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();

        let cfg = ScanConfig {
            exclude_globs: vec!["**/generated/**".into()],
            ..Default::default()
        };
        let excl = ExclusionSet::from_config(&cfg);
        assert_eq!(rels(dir.path(), &excl), vec!["app.py"]);
    }

    #[test]
    fn test_invalid_custom_glob_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();

        let cfg = ScanConfig {
            exclude_globs: vec!["[invalid".into()],
            ..Default::default()
        };
        let excl = ExclusionSet::from_config(&cfg);
        assert_eq!(rels(dir.path(), &excl), vec!["app.py"]);
    }

    #[test]
    fn test_hidden_files_are_scanned() {
        // .env files are exactly where keys leak; gitignore semantics must
        // not hide them from the scan.
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".env"), "API_KEY=x\n").unwrap();

        let excl = ExclusionSet::from_config(&ScanConfig::default());
        assert_eq!(rels(dir.path(), &excl), vec![".env"]);
    }

    #[test]
    fn test_own_config_file_excluded() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("llm-policy.yml"), "exclude_globs: []\n").unwrap();
        let excl = ExclusionSet::from_config(&ScanConfig::default());
        assert!(rels(dir.path(), &excl).is_empty());
    }

    #[test]
    fn test_oversized_file_skipped() {
        let dir = TempDir::new().unwrap();
        let big = "A".repeat((MAX_FILE_SIZE + 1) as usize);
        std::fs::write(dir.path().join("big.py"), big).unwrap();
        std::fs::write(dir.path().join("small.py"), "x = 1\n").unwrap();

        let excl = ExclusionSet::from_config(&ScanConfig::default());
        assert_eq!(rels(dir.path(), &excl), vec!["small.py"]);
    }

    #[test]
    fn test_nonexistent_root_yields_empty() {
        let excl = ExclusionSet::from_config(&ScanConfig::default());
        assert!(collect_candidates(Path::new("/nonexistent/xyz"), &excl).is_empty());
    }

    #[test]
    fn test_is_config_like() {
        assert!(is_config_like("settings.yml"));
        assert!(is_config_like("app.toml"));
        assert!(is_config_like("local.env"));
        assert!(!is_config_like("app.py"));
        assert!(!is_config_like("Makefile"));
    }

    #[test]
    fn test_read_lossy_tolerates_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("binary.py");
        std::fs::write(&path, [0x73, 0x6b, 0xff, 0xfe, 0x2d]).unwrap();
        let text = read_lossy(&path).unwrap();
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_read_lossy_missing_file() {
        assert!(read_lossy(Path::new("/nonexistent/file.py")).is_none());
    }
}
