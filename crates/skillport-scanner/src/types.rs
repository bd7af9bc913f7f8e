//! Scan issue and report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity levels for scan issues, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Contribution to the weighted risk score.
    pub fn weight(self) -> u32 {
        match self {
            Self::Info => 0,
            Self::Low => 2,
            Self::Medium => 5,
            Self::High => 15,
            Self::Critical => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// What kind of hazard a rule detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Secret,
    Dangerous,
    Pii,
    Obfuscation,
    Network,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::Dangerous => "dangerous",
            Self::Pii => "pii",
            Self::Obfuscation => "obfuscation",
            Self::Network => "network",
        }
    }
}

/// One finding at a specific file and line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanIssue {
    pub rule_id: String,
    pub category: Category,
    pub severity: Severity,
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    pub message: String,
    /// First 200 characters of the offending line.
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// True iff no high and no critical issues.
    pub passed: bool,
    /// Weighted score, saturating at 100.
    pub risk_score: u32,
    pub summary: ScanSummary,
    pub issues: Vec<ScanIssue>,
    pub scanned_files: Vec<String>,
    pub skipped_files: Vec<String>,
    pub scanned_at: DateTime<Utc>,
    pub scanner_version: String,
}

/// Saturation cap for the weighted score.
pub const MAX_RISK_SCORE: u32 = 100;

impl ScanReport {
    /// Assemble a report from raw findings. Scoring is monotone in issue
    /// additions and saturates at [`MAX_RISK_SCORE`].
    pub fn from_issues(
        issues: Vec<ScanIssue>,
        scanned_files: Vec<String>,
        skipped_files: Vec<String>,
    ) -> Self {
        let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        let mut weight_sum: u64 = 0;
        for issue in &issues {
            *by_severity
                .entry(issue.severity.as_str().to_string())
                .or_insert(0) += 1;
            *by_category
                .entry(issue.category.as_str().to_string())
                .or_insert(0) += 1;
            weight_sum += u64::from(issue.severity.weight());
        }
        let risk_score = weight_sum.min(u64::from(MAX_RISK_SCORE)) as u32;
        let passed = !issues
            .iter()
            .any(|i| matches!(i.severity, Severity::High | Severity::Critical));
        Self {
            passed,
            risk_score,
            summary: ScanSummary {
                total: issues.len(),
                by_severity,
                by_category,
            },
            issues,
            scanned_files,
            skipped_files,
            scanned_at: Utc::now(),
            scanner_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(severity: Severity) -> ScanIssue {
        ScanIssue {
            rule_id: "TEST01".to_string(),
            category: Category::Secret,
            severity,
            file: "a.ts".to_string(),
            line: 1,
            message: "m".to_string(),
            snippet: "s".to_string(),
            remediation: None,
        }
    }

    #[test]
    fn test_score_weights() {
        let report = ScanReport::from_issues(
            vec![issue(Severity::Low), issue(Severity::Medium), issue(Severity::High)],
            vec![],
            vec![],
        );
        assert_eq!(report.risk_score, 2 + 5 + 15);
        assert!(!report.passed);
    }

    #[test]
    fn test_score_saturates_at_100() {
        let issues: Vec<_> = (0..10).map(|_| issue(Severity::Critical)).collect();
        let report = ScanReport::from_issues(issues, vec![], vec![]);
        assert_eq!(report.risk_score, 100);
    }

    #[test]
    fn test_score_is_monotone() {
        let mut issues = vec![issue(Severity::Medium)];
        let before = ScanReport::from_issues(issues.clone(), vec![], vec![]).risk_score;
        issues.push(issue(Severity::Info));
        let with_info = ScanReport::from_issues(issues.clone(), vec![], vec![]).risk_score;
        issues.push(issue(Severity::Critical));
        let with_critical = ScanReport::from_issues(issues, vec![], vec![]).risk_score;
        assert!(with_info >= before);
        assert!(with_critical >= with_info);
        assert!(with_critical <= MAX_RISK_SCORE);
    }

    #[test]
    fn test_passed_requires_no_high_or_critical() {
        let ok = ScanReport::from_issues(
            vec![issue(Severity::Low), issue(Severity::Medium)],
            vec![],
            vec![],
        );
        assert!(ok.passed);
        let bad = ScanReport::from_issues(vec![issue(Severity::Critical)], vec![], vec![]);
        assert!(!bad.passed);
    }
}
