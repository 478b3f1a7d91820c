//! Malware/vulnerability classification of raw OSV findings.
//!
//! [`classify`] is a pure, total function over the raw record shape. The
//! malware signal is a conservative OR of several heuristics (id prefix
//! and free-text substring matches); it tolerates false positives, and
//! the `MAL-` prefix signal is the one that must never be missed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::osv::{Affected, Reference, SeverityField, Vuln};

/// Maximum length of a summary derived from the details body.
const SUMMARY_MAX_CHARS: usize = 200;

/// Normalized projection of a raw finding, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedFinding {
    pub id: String,
    pub summary: String,
    pub details: String,
    pub severity: String,
    pub is_malware: bool,
    pub aliases: Vec<String>,
    pub references: Vec<Reference>,
    pub affected: Vec<Affected>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    pub database_specific: Map<String, Value>,
}

/// Classifies one raw finding into its normalized projection.
pub fn classify(raw: &Vuln) -> ClassifiedFinding {
    let summary = derive_summary(raw);
    let severity = derive_severity(raw);
    let is_malware = is_malware(raw, &summary);

    ClassifiedFinding {
        id: raw.id.clone(),
        summary,
        details: raw.details.clone().unwrap_or_default(),
        severity,
        is_malware,
        aliases: raw.aliases.clone(),
        references: raw.references.clone(),
        affected: raw.affected.clone(),
        published: raw.published,
        modified: raw.modified,
        database_specific: raw.database_specific.clone(),
    }
}

/// Uses the record's summary when present, else the first meaningful line
/// of the details body (truncated), else a fixed fallback.
fn derive_summary(raw: &Vuln) -> String {
    if let Some(summary) = &raw.summary {
        if !summary.is_empty() {
            return summary.clone();
        }
    }

    if let Some(details) = &raw.details {
        for line in details.lines() {
            let line = line.trim();
            if !line.is_empty() && !line.starts_with("---") {
                return line.chars().take(SUMMARY_MAX_CHARS).collect();
            }
        }
    }

    "No summary available".to_string()
}

/// Severity priority: first score of a list, uppercased string,
/// `database_specific.severity`, then `"UNKNOWN"`. A `MAL-` id overrides
/// everything.
fn derive_severity(raw: &Vuln) -> String {
    if raw.id.starts_with("MAL-") {
        return "CRITICAL (MALWARE)".to_string();
    }

    let from_field = match &raw.severity {
        Some(SeverityField::Scores(scores)) if !scores.is_empty() => {
            Some(scores[0].score.clone().unwrap_or_else(|| "UNKNOWN".to_string()))
        }
        Some(SeverityField::Text(text)) if !text.is_empty() => Some(text.to_uppercase()),
        _ => None,
    };

    from_field
        .or_else(|| {
            raw.database_specific
                .get("severity")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

fn is_malware(raw: &Vuln, summary: &str) -> bool {
    raw.id.starts_with("MAL-")
        || summary.to_lowercase().contains("malicious")
        || raw
            .details
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .contains("malware")
        || raw.references.iter().any(|r| {
            r.kind
                .as_deref()
                .unwrap_or_default()
                .to_lowercase()
                .contains("malware")
                || r.url
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains("malicious")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vuln(value: serde_json::Value) -> Vuln {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_mal_prefix_forces_malware_and_severity() {
        let raw = vuln(json!({
            "id": "MAL-1234",
            "summary": "Totally benign wording",
            "severity": [{"type": "CVSS_V3", "score": "2.1"}]
        }));

        let finding = classify(&raw);
        assert!(finding.is_malware);
        assert_eq!(finding.severity, "CRITICAL (MALWARE)");
    }

    #[test]
    fn test_summary_from_details_first_line() {
        let raw = vuln(json!({
            "id": "GHSA-1",
            "summary": "",
            "details": "line1\nline2"
        }));

        assert_eq!(classify(&raw).summary, "line1");
    }

    #[test]
    fn test_summary_skips_separator_lines() {
        let raw = vuln(json!({
            "id": "GHSA-1",
            "details": "---\n\n  actual description  \nmore"
        }));

        assert_eq!(classify(&raw).summary, "actual description");
    }

    #[test]
    fn test_summary_truncated_to_200_chars() {
        let long = "x".repeat(300);
        let raw = vuln(json!({"id": "GHSA-1", "details": long}));
        assert_eq!(classify(&raw).summary.chars().count(), 200);
    }

    #[test]
    fn test_summary_fallback() {
        let raw = vuln(json!({"id": "GHSA-1"}));
        assert_eq!(classify(&raw).summary, "No summary available");
    }

    #[test]
    fn test_severity_from_score_list() {
        let raw = vuln(json!({
            "id": "GHSA-1",
            "severity": [
                {"type": "CVSS_V3", "score": "CVSS:3.1/AV:N/AC:L"},
                {"type": "CVSS_V2", "score": "ignored"}
            ]
        }));
        assert_eq!(classify(&raw).severity, "CVSS:3.1/AV:N/AC:L");
    }

    #[test]
    fn test_severity_from_string_uppercased() {
        let raw = vuln(json!({"id": "GHSA-1", "severity": "moderate"}));
        assert_eq!(classify(&raw).severity, "MODERATE");
    }

    #[test]
    fn test_severity_from_database_specific() {
        let raw = vuln(json!({
            "id": "GHSA-1",
            "database_specific": {"severity": "High"}
        }));
        // database_specific severity is used verbatim, not uppercased
        assert_eq!(classify(&raw).severity, "High");
    }

    #[test]
    fn test_severity_empty_list_falls_through() {
        let raw = vuln(json!({
            "id": "GHSA-1",
            "severity": [],
            "database_specific": {"severity": "Low"}
        }));
        assert_eq!(classify(&raw).severity, "Low");
    }

    #[test]
    fn test_severity_unknown() {
        let raw = vuln(json!({"id": "GHSA-1"}));
        assert_eq!(classify(&raw).severity, "UNKNOWN");
    }

    #[test]
    fn test_malware_from_summary_substring() {
        let raw = vuln(json!({"id": "GHSA-1", "summary": "Malicious code in pkg"}));
        assert!(classify(&raw).is_malware);
    }

    #[test]
    fn test_malware_from_details_substring() {
        let raw = vuln(json!({"id": "GHSA-1", "details": "ships Malware payload"}));
        assert!(classify(&raw).is_malware);
    }

    #[test]
    fn test_malware_from_reference() {
        let by_type = vuln(json!({
            "id": "GHSA-1",
            "references": [{"type": "MALWARE_REPORT", "url": "https://example.com"}]
        }));
        assert!(classify(&by_type).is_malware);

        let by_url = vuln(json!({
            "id": "GHSA-1",
            "references": [{"type": "WEB", "url": "https://github.com/ossf/malicious-packages"}]
        }));
        assert!(classify(&by_url).is_malware);
    }

    #[test]
    fn test_plain_vulnerability_is_not_malware() {
        let raw = vuln(json!({
            "id": "GHSA-1",
            "summary": "Prototype pollution",
            "details": "An attacker can modify Object.prototype",
            "references": [{"type": "ADVISORY", "url": "https://github.com/advisories/GHSA-1"}]
        }));
        let finding = classify(&raw);
        assert!(!finding.is_malware);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let raw = vuln(json!({
            "id": "MAL-2024-42",
            "details": "malware dropper",
            "aliases": ["GHSA-2"],
            "published": "2024-03-01T12:00:00Z"
        }));
        assert_eq!(classify(&raw), classify(&raw));
    }
}
