//! Rate-limit call-site analyzer — LLM calls in loops without throttling.
//!
//! Python files get a syntax-tree pass: every `for`/`while` body is searched
//! for call expressions. A body that issues an LLM provider call but no
//! throttling call yields a missing-rate-limit finding anchored at the loop
//! line; a throttling call whose first literal duration is below the
//! configured minimum yields a separate sleep-too-short finding at the call
//! line. The two checks are independent and may co-occur for one loop.
//!
//! Languages without a syntax tree fall back to a whole-file heuristic with
//! a documented higher false-negative rate: a throttling call anywhere in
//! the file silences it, even one outside the loop.

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

/// Providers whose method calls count as LLM API traffic.
const API_PROVIDERS: &[&str] = &["openai", "anthropic", "cohere", "mistral"];

/// A call throttles when its callee's last dotted segment is `sleep`
/// (`time.sleep`, `asyncio.sleep`, bare `sleep`).
const SLEEP_SEGMENT: &str = "sleep";

/// Textual form of the provider-method pattern, for the whole-file fallback.
fn provider_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(openai|anthropic|cohere|mistral)\s*\.\s*\w+").unwrap()
    })
}

// ---------------------------------------------------------------------------
// Public scan entry point
// ---------------------------------------------------------------------------

/// Scan candidate files under `root` for unthrottled LLM call loops.
/// Returns all findings sorted by (path, line); the aggregator caps them.
pub fn scan(root: &Path, cfg: &ScanConfig) -> Vec<Finding> {
    let enabled = cfg.rate_limit.enabled_languages();
    let min_sleep = cfg.rate_limit.min_sleep_seconds;
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
                analyze_python_source(&f.rel, &source, min_sleep).unwrap_or_else(|e| {
                    vec![Finding::new(
                        &f.rel,
                        None,
                        FindingCategory::ParseFailure,
                        &format!("failed to parse python source: {e}"),
                    )]
                })
            } else {
                heuristic_scan(&f.rel, &source).into_iter().collect()
            })
        })
        .flatten()
        .collect();
    findings.sort();
    findings
}

/// Analyze one Python file. A parse failure is an `Err` the caller converts
/// into a single diagnostic finding.
pub fn analyze_python_source(
    rel_path: &str,
    source: &str,
    min_sleep: f64,
) -> Result<Vec<Finding>> {
    let tree = SyntaxParser::new().parse(source, Language::Python)?;
    let mut findings = Vec::new();
    visit(
        tree.root_node(),
        source.as_bytes(),
        rel_path,
        min_sleep,
        &mut findings,
    );
    Ok(findings)
}

// ---------------------------------------------------------------------------
// Syntax-tree walk
// ---------------------------------------------------------------------------

/// Find loop constructs. A loop's body is inspected as one unit; nested
/// loops contribute their calls to the enclosing inspection rather than
/// being reported separately.
fn visit(node: Node, src: &[u8], rel_path: &str, min_sleep: f64, findings: &mut Vec<Finding>) {
    if matches!(node.kind(), "for_statement" | "while_statement") {
        inspect_loop(node, src, rel_path, min_sleep, findings);
        return;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();
    for child in children {
        visit(child, src, rel_path, min_sleep, findings);
    }
}

fn inspect_loop(
    loop_node: Node,
    src: &[u8],
    rel_path: &str,
    min_sleep: f64,
    findings: &mut Vec<Finding>,
) {
    let Some(body) = loop_node.child_by_field_name("body") else {
        return;
    };

    let mut calls = Vec::new();
    collect_calls(body, &mut calls);

    let mut found_api_call = false;
    let mut found_sleep_call = false;

    for call in &calls {
        let Some(callee) = dotted_name(call.child_by_field_name("function"), src) else {
            continue;
        };

        if is_provider_method_call(&callee) {
            found_api_call = true;
        }

        if callee.rsplit('.').next() == Some(SLEEP_SEGMENT) {
            found_sleep_call = true;
            if let Some(duration) = first_numeric_argument(*call, src) {
                if duration < min_sleep {
                    findings.push(Finding::new(
                        rel_path,
                        Some(call.start_position().row + 1),
                        FindingCategory::SleepTooShort,
                        &format!(
                            "sleep duration {duration}s below configured minimum {min_sleep}s"
                        ),
                    ));
                }
            }
        }
    }

    if found_api_call && !found_sleep_call {
        findings.push(Finding::new(
            rel_path,
            Some(loop_node.start_position().row + 1),
            FindingCategory::MissingRateLimit,
            "LLM API call in loop without rate limiting",
        ));
    }
}

/// Every call expression in a subtree, nested expressions included.
fn collect_calls<'a>(node: Node<'a>, out: &mut Vec<Node<'a>>) {
    if node.kind() == "call" {
        out.push(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_calls(child, out);
    }
}

fn dotted_name(node: Option<Node>, src: &[u8]) -> Option<String> {
    let node = node?;
    match node.kind() {
        "identifier" => Some(node.utf8_text(src).ok()?.to_string()),
        "attribute" => {
            let object = dotted_name(node.child_by_field_name("object"), src)?;
            let attr = node.child_by_field_name("attribute")?;
            Some(format!("{object}.{}", attr.utf8_text(src).ok()?))
        }
        _ => None,
    }
}

/// A dotted callee counts as a provider method call when a provider name
/// appears as a non-final segment (`openai.ChatCompletion.create`).
fn is_provider_method_call(callee: &str) -> bool {
    let segments: Vec<&str> = callee.split('.').collect();
    segments
        .iter()
        .take(segments.len().saturating_sub(1))
        .any(|seg| API_PROVIDERS.contains(&seg.to_lowercase().as_str()))
}

/// The first positional argument when it is a numeric literal.
fn first_numeric_argument(call: Node, src: &[u8]) -> Option<f64> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let first = args
        .named_children(&mut cursor)
        .find(|c| c.kind() != "comment")?;
    match first.kind() {
        "integer" | "float" => first.utf8_text(src).ok()?.parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Textual fallback
// ---------------------------------------------------------------------------

/// Whole-file heuristic for languages without a syntax tree: a provider
/// method call somewhere in the file and no `sleep` anywhere at all.
pub fn heuristic_scan(rel_path: &str, source: &str) -> Option<Finding> {
    if provider_call_re().is_match(source) && !source.contains(SLEEP_SEGMENT) {
        Some(Finding::new(
            rel_path,
            None,
            FindingCategory::MissingRateLimit,
            "possible missing rate-limit (no throttling call found)",
        ))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
