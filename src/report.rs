//! Finding aggregation.
//!
//! Merges the three engines' outputs into one report: per-category counts, a
//! capped list of human-readable detail lines per engine, and the uncapped
//! true totals. No suppression happens here, and no pass/fail policy either
//! — which categories gate a build is the calling orchestrator's decision.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::config::ScanConfig;
use crate::engines;
use crate::types::Finding;

// ---------------------------------------------------------------------------
// EngineReport
// ---------------------------------------------------------------------------

/// One engine's aggregated output.
#[derive(Debug, Clone, Serialize)]
pub struct EngineReport {
    /// Uncapped number of findings, even when `details` is truncated.
    pub total: usize,
    /// Findings per category (uncapped counts).
    pub categories: BTreeMap<String, usize>,
    /// Detail lines `path:line: message`, sorted, truncated to the cap.
    pub details: Vec<String>,
}

impl EngineReport {
    /// Build from a sorted finding list. Sorting happens in the engines so
    /// truncation order never depends on traversal or scheduling.
    pub fn from_findings(findings: &[Finding], cap: usize) -> Self {
        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        for f in findings {
            *categories.entry(f.category.to_string()).or_insert(0) += 1;
        }
        EngineReport {
            total: findings.len(),
            categories,
            details: findings.iter().take(cap).map(Finding::detail).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyReport
// ---------------------------------------------------------------------------

/// The merged scan report. Engines disabled via `policies.*` are absent.
#[derive(Debug, Serialize)]
pub struct PolicyReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_security: Option<EngineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<EngineReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_sanitize: Option<EngineReport>,
}

impl PolicyReport {
    /// Sum of uncapped totals across the engines that ran.
    pub fn total_findings(&self) -> usize {
        [&self.api_key_security, &self.rate_limit, &self.input_sanitize]
            .iter()
            .filter_map(|r| r.as_ref().map(|r| r.total))
            .sum()
    }
}

/// Run every enabled engine over `root` and merge the results.
pub fn aggregate(root: &Path, cfg: &ScanConfig) -> PolicyReport {
    let api_key_security = cfg.policies.api_key_security.then(|| {
        let findings = engines::secrets::scan(root, cfg);
        EngineReport::from_findings(&findings, cfg.secrets.max_findings)
    });
    let rate_limit = cfg.policies.rate_limit.then(|| {
        let findings = engines::rate_limit::scan(root, cfg);
        EngineReport::from_findings(&findings, cfg.rate_limit.max_findings)
    });
    let input_sanitize = cfg.policies.input_sanitize.then(|| {
        let findings = engines::taint::scan(root, cfg);
        EngineReport::from_findings(&findings, cfg.input_sanitize.max_findings)
    });

    PolicyReport {
        api_key_security,
        rate_limit,
        input_sanitize,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FindingCategory;
    use pretty_assertions::assert_eq;

    fn secret(path: &str, line: usize) -> Finding {
        Finding::new(path, Some(line), FindingCategory::Secret, "excerpt")
    }

    #[test]
    fn test_total_reflects_uncapped_count() {
        let findings: Vec<Finding> = (1..=30).map(|i| secret("a.py", i)).collect();
        let report = EngineReport::from_findings(&findings, 20);
        assert_eq!(report.total, 30);
        assert_eq!(report.details.len(), 20);
    }

    #[test]
    fn test_details_keep_sorted_prefix() {
        let findings = vec![secret("a.py", 1), secret("a.py", 2), secret("b.py", 1)];
        let report = EngineReport::from_findings(&findings, 2);
        assert_eq!(
            report.details,
            vec!["a.py:1: excerpt".to_string(), "a.py:2: excerpt".to_string()]
        );
    }

    #[test]
    fn test_category_counts() {
        let findings = vec![
            Finding::new("a.py", Some(1), FindingCategory::MissingRateLimit, "m"),
            Finding::new("a.py", Some(4), FindingCategory::SleepTooShort, "s"),
            Finding::new("b.py", Some(2), FindingCategory::MissingRateLimit, "m"),
        ];
        let report = EngineReport::from_findings(&findings, 100);
        assert_eq!(report.categories.get("missing-rate-limit"), Some(&2));
        assert_eq!(report.categories.get("sleep-too-short"), Some(&1));
    }

    #[test]
    fn test_empty_engine_report() {
        let report = EngineReport::from_findings(&[], 20);
        assert_eq!(report.total, 0);
        assert!(report.details.is_empty());
        assert!(report.categories.is_empty());
    }

    #[test]
    fn test_policy_report_total() {
        let r = PolicyReport {
            api_key_security: Some(EngineReport::from_findings(&[secret("a.py", 1)], 20)),
            rate_limit: Some(EngineReport::from_findings(&[], 100)),
            input_sanitize: None,
        };
        assert_eq!(r.total_findings(), 1);
    }

    #[test]
    fn test_disabled_engine_absent_from_json() {
        let r = PolicyReport {
            api_key_security: None,
            rate_limit: Some(EngineReport::from_findings(&[], 100)),
            input_sanitize: None,
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("api_key_security"));
        assert!(json.contains("rate_limit"));
    }
}
