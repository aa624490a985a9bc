//! Native tree-sitter parser wrapper.
//!
//! Only Python carries a statically linked grammar — it is the one language
//! the flow analyzers walk at the syntax-tree level; everything else goes
//! through the engines' textual fallbacks. The wrapper creates a fresh
//! `tree_sitter::Parser` per call: the underlying C object is `!Send`, and
//! `Parser::new()` is a single allocation, so this keeps the API `Send` +
//! `Sync` for rayon workers without any locking.

use crate::error::{Result, ScanError};
use crate::types::Language;

/// Thin wrapper around native tree-sitter parsing.
///
/// Zero-sized; create with [`SyntaxParser::new`] and reuse freely.
pub struct SyntaxParser;

impl SyntaxParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse `content` with the grammar for `language`.
    ///
    /// Returns `ScanError::Parse` when the language has no grammar, when
    /// tree-sitter gives up, or when the resulting tree contains syntax
    /// errors — callers turn that into a per-file diagnostic finding.
    pub fn parse(&self, content: &str, language: Language) -> Result<tree_sitter::Tree> {
        let ts_lang = Self::grammar(language).ok_or_else(|| {
            ScanError::Parse(format!("no syntax tree available for {language}"))
        })?;

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&ts_lang)
            .map_err(|e| ScanError::Parse(format!("language version mismatch: {e}")))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ScanError::Parse("tree-sitter returned no tree".into()))?;

        if tree.root_node().has_error() {
            return Err(ScanError::Parse(format!(
                "{language} source contains syntax errors"
            )));
        }
        Ok(tree)
    }

    /// The native grammar for a [`Language`], when one is linked in.
    #[must_use]
    pub fn grammar(language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            _ => None,
        }
    }
}

impl Default for SyntaxParser {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_python_returns_valid_tree() {
        let parser = SyntaxParser::new();
        let source = r#"
import os

def greet(name):
    return f"Hello, {name}!"

class Service:
    def run(self):
        return greet("world")
"#;
        let tree = parser
            .parse(source, Language::Python)
            .expect("should parse Python");
        let root = tree.root_node();
        assert_eq!(root.kind(), "module");
        assert!(root.child_count() > 0);
    }

    #[test]
    fn parse_empty_source_returns_tree() {
        let parser = SyntaxParser::new();
        let tree = parser.parse("", Language::Python).expect("empty source");
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn parse_broken_python_is_an_error() {
        let parser = SyntaxParser::new();
        let result = parser.parse("def broken(:\n  ???", Language::Python);
        assert!(result.is_err());
    }

    #[test]
    fn parse_unsupported_language_is_an_error() {
        let parser = SyntaxParser::new();
        for lang in [Language::JavaScript, Language::TypeScript, Language::Go] {
            assert!(parser.parse("var x = 1;", lang).is_err());
        }
    }
}
