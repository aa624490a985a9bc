//! Taint-flow analyzer — untrusted input reaching LLM calls unsanitized.
//!
//! Python files get a single intraprocedural pass over the tree-sitter
//! syntax tree. The pass threads an explicit [`TaintState`] (variable →
//! Clean / Tainted / Sanitized) through the statements in syntactic order and
//! checks every LLM-provider call site's positional arguments. Context for
//! nested nodes comes from an explicit ancestor stack carried by the
//! traversal — tree nodes are never annotated.
//!
//! Propagation is single-hop: an assignment whose right-hand side references
//! a tainted variable, or calls a wrapper with a tainted argument, taints the
//! target. There is no fixed-point iteration across arbitrary call depth;
//! that tradeoff keeps false positives low at the cost of missing deep chains.
//!
//! Languages without a syntax tree fall back to a line-level heuristic
//! (see [`heuristic_scan`]), which is documented as weaker.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;
use tree_sitter::Node;

use crate::config::ScanConfig;
use crate::error::Result;
use crate::parser::SyntaxParser;
use crate::types::{Finding, FindingCategory, Language};
use crate::walker::{self, ExclusionSet};

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// Calls whose result is untrusted: interactive input and request payloads.
const UNTRUSTED_SOURCES: &[&str] = &["input", "request.get_json", "request.json"];

/// Recognized sanitizers. Matching is exact against the full dotted name or
/// its last segment — never substring containment.
const SANITIZERS: &[&str] = &[
    "html.escape",
    "re.escape",
    "bleach.clean",
    "sanitize_input",
    "strip_tags",
    "escape_html",
    "mark_safe",
    "escape",
];

/// LLM vendor name fragments. A call site whose dotted callee contains one
/// of these as an exact segment is treated as an LLM API call.
const LLM_PROVIDERS: &[&str] = &[
    "openai",
    "anthropic",
    "cohere",
    "mistral",
    "llama",
    "langchain",
    "huggingface",
    "transformers",
];

/// Assignment targets that hold the injection-phrase registry itself.
/// String literals under such assignments are exempt from the phrase check
/// so the scanner does not flag its own (or a vendored) pattern table.
const PATTERN_REGISTRY_TARGETS: &[&str] = &["PROMPT_INJECTION_PATTERNS", "INJECTION_PATTERNS"];

/// Instruction-override phrasing checked against string literal arguments.
fn injection_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)ignore (previous|all) instructions",
            r"(?i)you are now",
            r"(?i)as an ai",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

// ---------------------------------------------------------------------------
// TaintState
// ---------------------------------------------------------------------------

/// Per-variable flow state within one file's analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarState {
    Clean,
    Tainted,
    Sanitized,
}

/// Variable-name → state mapping, scoped to a single file walk.
/// Clean is the default for names never assigned; reads never change state.
#[derive(Debug, Default)]
pub struct TaintState {
    vars: HashMap<String, VarState>,
}

impl TaintState {
    pub fn state(&self, name: &str) -> VarState {
        self.vars.get(name).copied().unwrap_or(VarState::Clean)
    }

    fn set(&mut self, name: &str, state: VarState) {
        self.vars.insert(name.to_string(), state);
    }
}

// ---------------------------------------------------------------------------
// Public scan entry point
// ---------------------------------------------------------------------------

/// Scan candidate files under `root` for unsanitized input flows.
/// Returns all findings sorted by (path, line); the aggregator caps them.
pub fn scan(root: &Path, cfg: &ScanConfig) -> Vec<Finding> {
    let enabled = cfg.input_sanitize.enabled_languages();
    let exclusions = ExclusionSet::from_config(cfg);
    let files = walker::collect_candidates(root, &exclusions);

    let mut findings: Vec<Finding> = files
        .par_iter()
        .filter_map(|f| {
            let lang = Language::from_path(&f.rel)?;
            if !enabled.contains(&lang) {
                return None;
            }
            let source = walker::read_lossy(&f.abs)?;
            Some(if lang.has_syntax_tree() {
                analyze_python_source(&f.rel, &source).unwrap_or_else(|e| {
                    vec![Finding::new(
                        &f.rel,
                        None,
                        FindingCategory::ParseFailure,
                        &format!("failed to parse python source: {e}"),
                    )]
                })
            } else {
                heuristic_scan(&f.rel, &source)
            })
        })
        .flatten()
        .collect();
    findings.sort();
    findings
}

/// Analyze one Python file. A parse failure is an `Err` the caller converts
/// into a single diagnostic finding; it never aborts the run.
pub fn analyze_python_source(rel_path: &str, source: &str) -> Result<Vec<Finding>> {
    let tree = SyntaxParser::new().parse(source, Language::Python)?;
    let mut walk = FileWalk {
        src: source.as_bytes(),
        rel_path,
        state: TaintState::default(),
        findings: Vec::new(),
        assign_targets: Vec::new(),
    };
    walk.visit(tree.root_node());
    Ok(walk.findings)
}

// ---------------------------------------------------------------------------
// Syntax-tree walk
// ---------------------------------------------------------------------------

struct FileWalk<'a> {
    src: &'a [u8],
    rel_path: &'a str,
    state: TaintState,
    findings: Vec<Finding>,
    /// Names of enclosing assignment targets, innermost last. This is the
    /// explicit ancestor context the literal check needs.
    assign_targets: Vec<String>,
}

impl FileWalk<'_> {
    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "assignment" => {
                self.apply_assignment(node);
                let target = node
                    .child_by_field_name("left")
                    .and_then(|l| self.identifier_text(l));
                let pushed = target.is_some();
                if let Some(t) = target {
                    self.assign_targets.push(t);
                }
                self.visit_children(node);
                if pushed {
                    self.assign_targets.pop();
                }
                return;
            }
            "call" => self.check_call(node),
            _ => {}
        }
        self.visit_children(node);
    }

    fn visit_children(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    /// Apply the transition rules for one assignment, in order:
    /// untrusted source → Tainted; sanitizer → Sanitized; tainted reference
    /// or tainted call argument → Tainted; anything else leaves state as is.
    fn apply_assignment(&mut self, node: Node<'_>) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        let Some(mut right) = node.child_by_field_name("right") else {
            return;
        };
        // chained assignment (`a = b = value`): classify the innermost value
        while right.kind() == "assignment" {
            match right.child_by_field_name("right") {
                Some(inner) => right = inner,
                None => return,
            }
        }

        let targets = self.target_names(left);
        if targets.is_empty() {
            return;
        }

        let new_state = match right.kind() {
            "call" => {
                let callee = right
                    .child_by_field_name("function")
                    .and_then(|f| self.dotted_name(f));
                match callee.as_deref() {
                    Some(name) if UNTRUSTED_SOURCES.contains(&name) => Some(VarState::Tainted),
                    Some(name) if is_sanitizer(name) => Some(VarState::Sanitized),
                    _ => {
                        // single-hop propagation through a wrapper call
                        if self.any_positional_arg_tainted(right) {
                            Some(VarState::Tainted)
                        } else {
                            None
                        }
                    }
                }
            }
            "identifier" => {
                let name = self.node_text(right);
                if self.state.state(&name) == VarState::Tainted {
                    Some(VarState::Tainted)
                } else {
                    None
                }
            }
            _ => None,
        };

        if let Some(state) = new_state {
            for t in &targets {
                self.state.set(t, state);
            }
        }
    }

    /// Check one call site: tainted arguments into LLM-provider calls, and
    /// prompt-injection phrasing in literal arguments of any call.
    fn check_call(&mut self, node: Node<'_>) {
        let callee = node
            .child_by_field_name("function")
            .and_then(|f| self.dotted_name(f));
        let args = self.positional_args(node);
        let line = node.start_position().row + 1;

        if let Some(callee) = callee.as_deref() {
            if is_llm_provider_call(callee) {
                for arg in &args {
                    match arg.kind() {
                        "identifier" => {
                            let name = self.node_text(*arg);
                            if self.state.state(&name) == VarState::Tainted {
                                self.findings.push(
                                    Finding::new(
                                        self.rel_path,
                                        Some(line),
                                        FindingCategory::UnsanitizedInput,
                                        &format!(
                                            "unsanitized input reaches LLM call '{callee}'"
                                        ),
                                    )
                                    .with_tag(name),
                                );
                            }
                        }
                        "string" => {
                            for name in self.interpolated_identifiers(*arg) {
                                if self.state.state(&name) == VarState::Tainted {
                                    self.findings.push(
                                        Finding::new(
                                            self.rel_path,
                                            Some(line),
                                            FindingCategory::UnsanitizedInput,
                                            &format!(
                                                "tainted f-string argument in LLM call '{callee}'"
                                            ),
                                        )
                                        .with_tag(name),
                                    );
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        // Literal arguments of any call are screened for injection phrasing,
        // except under a pattern-registry assignment.
        if self.under_pattern_registry() {
            return;
        }
        for arg in &args {
            if arg.kind() != "string" || !self.interpolated_identifiers(*arg).is_empty() {
                continue;
            }
            let text = self.string_text(*arg);
            if injection_patterns().iter().any(|p| p.is_match(&text)) {
                self.findings.push(Finding::new(
                    self.rel_path,
                    Some(arg.start_position().row + 1),
                    FindingCategory::SuspiciousContent,
                    "possible prompt injection phrase in string literal",
                ));
            }
        }
    }

    // -- node helpers -------------------------------------------------------

    fn node_text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.src).unwrap_or_default().to_string()
    }

    fn identifier_text(&self, node: Node<'_>) -> Option<String> {
        (node.kind() == "identifier").then(|| self.node_text(node))
    }

    /// Assignment target names: a bare identifier, or each identifier in a
    /// tuple/list target pattern.
    fn target_names(&self, left: Node<'_>) -> Vec<String> {
        match left.kind() {
            "identifier" => vec![self.node_text(left)],
            "pattern_list" | "tuple_pattern" => {
                let mut cursor = left.walk();
                left.named_children(&mut cursor)
                    .filter(|c| c.kind() == "identifier")
                    .map(|c| self.node_text(c))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// Dotted callee name: `identifier` or nested `attribute` chains.
    fn dotted_name(&self, node: Node<'_>) -> Option<String> {
        match node.kind() {
            "identifier" => Some(self.node_text(node)),
            "attribute" => {
                let object = self.dotted_name(node.child_by_field_name("object")?)?;
                let attr = node.child_by_field_name("attribute")?;
                Some(format!("{object}.{}", self.node_text(attr)))
            }
            _ => None,
        }
    }

    fn positional_args<'t>(&self, call: Node<'t>) -> Vec<Node<'t>> {
        let Some(args) = call.child_by_field_name("arguments") else {
            return Vec::new();
        };
        let mut cursor = args.walk();
        args.named_children(&mut cursor)
            .filter(|c| c.kind() != "keyword_argument" && c.kind() != "comment")
            .collect()
    }

    fn any_positional_arg_tainted(&self, call: Node<'_>) -> bool {
        self.positional_args(call).iter().any(|arg| {
            arg.kind() == "identifier"
                && self.state.state(&self.node_text(*arg)) == VarState::Tainted
        })
    }

    /// Identifiers embedded in a string's `{...}` interpolations (f-strings).
    fn interpolated_identifiers(&self, string: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = string.walk();
        for child in string.children(&mut cursor) {
            if child.kind() != "interpolation" {
                continue;
            }
            let expr = child
                .child_by_field_name("expression")
                .or_else(|| child.named_child(0));
            if let Some(expr) = expr {
                if expr.kind() == "identifier" {
                    names.push(self.node_text(expr));
                }
            }
        }
        names
    }

    /// Literal content of a plain string node, quotes stripped.
    fn string_text(&self, string: Node<'_>) -> String {
        let mut out = String::new();
        let mut cursor = string.walk();
        for child in string.children(&mut cursor) {
            if child.kind() == "string_content" {
                out.push_str(&self.node_text(child));
            }
        }
        out
    }

    fn under_pattern_registry(&self) -> bool {
        self.assign_targets
            .iter()
            .any(|t| PATTERN_REGISTRY_TARGETS.contains(&t.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Name classification
// ---------------------------------------------------------------------------

fn is_sanitizer(name: &str) -> bool {
    if SANITIZERS.contains(&name) {
        return true;
    }
    let last = name.rsplit('.').next().unwrap_or(name);
    SANITIZERS.contains(&last)
}

fn is_llm_provider_call(name: &str) -> bool {
    name.split('.')
        .any(|seg| LLM_PROVIDERS.contains(&seg.to_lowercase().as_str()))
}

// ---------------------------------------------------------------------------
// Textual fallback
// ---------------------------------------------------------------------------

/// Line-level heuristic for languages without a syntax tree: a prompt-ish
/// keyword assigned or keyed, with an LLM provider named within 100
/// characters. Weaker than the flow analysis by design.
pub fn heuristic_scan(rel_path: &str, source: &str) -> Vec<Finding> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?i)(prompt|message|input)\s*[:=].{0,100}\b(openai|anthropic|llama)\b")
            .unwrap()
    });

    source
        .lines()
        .enumerate()
        .filter(|(_, line)| re.is_match(line))
        .map(|(idx, _)| {
            Finding::new(
                rel_path,
                Some(idx + 1),
                FindingCategory::UnsanitizedInput,
                "possible unsanitized input into LLM API (heuristic)",
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
