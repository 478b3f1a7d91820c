use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classifier::ClassifiedFinding;

/// Outcome of a scan over one package or one dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanStatus {
    Clean,
    VulnerabilitiesDetected,
    MalwareDetected,
    Error,
}

/// Trimmed view of a finding for aggregate output: enough to triage
/// without the full record body.
#[derive(Debug, Clone, Serialize)]
pub struct IssueSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub severity: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    pub references: Vec<String>,
    pub aliases: Vec<String>,
}

impl From<&ClassifiedFinding> for IssueSummary {
    fn from(finding: &ClassifiedFinding) -> Self {
        Self {
            id: finding.id.clone(),
            kind: if finding.is_malware {
                "malware"
            } else {
                "vulnerability"
            },
            severity: finding.severity.clone(),
            summary: finding.summary.clone(),
            published: finding.published,
            references: finding
                .references
                .iter()
                .take(3)
                .filter_map(|r| r.url.clone())
                .collect(),
            aliases: finding.aliases.clone(),
        }
    }
}

/// Result of scanning a single package.
///
/// `issues` lists malware first, then ordinary vulnerabilities unless the
/// scan was malware-only; the counts always reflect everything found.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub package: String,
    pub status: ScanStatus,
    pub malware_count: usize,
    pub vulnerability_count: usize,
    pub issues: Vec<IssueSummary>,
    /// Full findings backing `issues`, kept for the text report.
    #[serde(skip)]
    pub findings: Vec<ClassifiedFinding>,
}

impl ScanResult {
    pub fn clean(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            status: ScanStatus::Clean,
            malware_count: 0,
            vulnerability_count: 0,
            issues: Vec::new(),
            findings: Vec::new(),
        }
    }
}

/// One package inside a batch result, with its selected issues.
#[derive(Debug, Clone, Serialize)]
pub struct AffectedPackage {
    /// `name@version` as it appeared in the dependency map.
    pub package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub malware_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vulnerability_count: Option<usize>,
    pub issues: Vec<IssueSummary>,
    #[serde(skip)]
    pub findings: Vec<ClassifiedFinding>,
}

/// Aggregate over many packages scanned in one batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchScanResult {
    pub status: ScanStatus,
    pub total_scanned: usize,
    /// Number of packages with at least one malware finding.
    pub malware_count: usize,
    /// Number of packages with at least one ordinary vulnerability.
    pub vulnerability_count: usize,
    pub malware_packages: Vec<AffectedPackage>,
    pub vulnerable_packages: Vec<AffectedPackage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchScanResult {
    pub fn empty() -> Self {
        Self {
            status: ScanStatus::Clean,
            total_scanned: 0,
            malware_count: 0,
            vulnerability_count: 0,
            malware_packages: Vec::new(),
            vulnerable_packages: Vec::new(),
            error: None,
        }
    }

    pub fn failed(total_scanned: usize, error: impl Into<String>) -> Self {
        Self {
            status: ScanStatus::Error,
            total_scanned,
            malware_count: 0,
            vulnerability_count: 0,
            malware_packages: Vec::new(),
            vulnerable_packages: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Batch result tagged with the repository it came from.
#[derive(Debug, Clone, Serialize)]
pub struct RepoScanResult {
    pub repository: String,
    #[serde(flatten)]
    pub scan: BatchScanResult,
}

/// A repository and the affected packages its dependency map contains.
#[derive(Debug, Clone, Serialize)]
pub struct AffectedRepository {
    pub repository: String,
    pub affected_packages: Vec<AffectedPackage>,
}

/// Aggregate over an organization-wide scan.
#[derive(Debug, Clone, Serialize)]
pub struct OrgScanResult {
    pub status: ScanStatus,
    pub organization: String,
    pub repositories_scanned: usize,
    pub repositories_with_dependencies: usize,
    pub repositories_affected: usize,
    pub total_unique_dependencies: usize,
    pub malware_count: usize,
    pub vulnerability_count: usize,
    pub affected_repositories: Vec<AffectedRepository>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(ScanStatus::MalwareDetected).unwrap(),
            "malware-detected"
        );
        assert_eq!(
            serde_json::to_value(ScanStatus::VulnerabilitiesDetected).unwrap(),
            "vulnerabilities-detected"
        );
        assert_eq!(serde_json::to_value(ScanStatus::Clean).unwrap(), "clean");
        assert_eq!(serde_json::to_value(ScanStatus::Error).unwrap(), "error");
    }

    #[test]
    fn test_issue_summary_limits_references() {
        let raw: crate::osv::Vuln = serde_json::from_value(serde_json::json!({
            "id": "GHSA-1",
            "summary": "s",
            "references": [
                {"type": "WEB", "url": "https://a"},
                {"type": "WEB", "url": "https://b"},
                {"type": "WEB", "url": "https://c"},
                {"type": "WEB", "url": "https://d"}
            ]
        }))
        .unwrap();
        let finding = crate::classifier::classify(&raw);
        let summary = IssueSummary::from(&finding);
        assert_eq!(summary.references, vec!["https://a", "https://b", "https://c"]);
        assert_eq!(summary.kind, "vulnerability");
    }

    #[test]
    fn test_failed_batch_result() {
        let result = BatchScanResult::failed(12, "batch query failed");
        assert_eq!(result.status, ScanStatus::Error);
        assert_eq!(result.total_scanned, 12);
        assert!(serde_json::to_value(&result).unwrap().get("error").is_some());
    }
}
