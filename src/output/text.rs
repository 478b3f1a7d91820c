//! Human-readable report rendering.
//!
//! Mirrors the structure of the scan results: per-package report with
//! malware listed first, then a summary section, with `tabled` tables for
//! the batch overview.

use serde_json::Value;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::classifier::ClassifiedFinding;
use crate::scan::{BatchScanResult, ScanResult, ScanStatus};

const RULE: &str = "================================================================================";
const SOFT_RULE: &str =
    "--------------------------------------------------------------------------------";

/// Prints the detailed report for one package.
///
/// Returns true when the package has malware or a critical/high finding,
/// so batch callers can tally critical packages.
pub fn print_package_report(
    package: &str,
    version: Option<&str>,
    findings: &[ClassifiedFinding],
    malware_only: bool,
) -> bool {
    let header = format!("{package}@{}", version.unwrap_or("any"));

    if findings.is_empty() {
        if !malware_only {
            println!("\n{RULE}");
            println!("Package: {header}");
            println!("{RULE}");
            println!("No known vulnerabilities or malware detected");
        }
        return false;
    }

    let (malware, vulnerabilities): (Vec<_>, Vec<_>) =
        findings.iter().partition(|f| f.is_malware);

    if malware_only && malware.is_empty() {
        return false;
    }

    println!("\n{RULE}");
    println!("Package: {header}");
    println!("{RULE}");

    if malware_only {
        println!("Total Issues: {} malware detected", malware.len());
    } else {
        println!(
            "Total Issues: {} ({} malware, {} vulnerabilities)",
            findings.len(),
            malware.len(),
            vulnerabilities.len()
        );
    }

    let mut has_critical = false;

    if !malware.is_empty() {
        println!("\n{:^80}", "MALWARE DETECTED");
        println!("{RULE}");
        has_critical = true;
        for finding in &malware {
            print_issue(finding, package);
        }
    }

    if !vulnerabilities.is_empty() && !malware_only {
        println!("\n{:^80}", "VULNERABILITIES");
        println!("{RULE}");
        for finding in &vulnerabilities {
            let severity = finding.severity.to_uppercase();
            if severity.contains("CRITICAL") || severity.contains("HIGH") {
                has_critical = true;
            }
            print_issue(finding, package);
        }
    }

    has_critical || !malware.is_empty()
}

fn print_issue(issue: &ClassifiedFinding, package_name: &str) {
    println!("\n{SOFT_RULE}");

    let issue_type = if issue.is_malware { "MALWARE" } else { "VULNERABILITY" };
    println!("{issue_type}: {}", issue.id);
    println!("   Severity: {}", issue.severity);

    if !issue.summary.is_empty() {
        println!("\n   Summary:");
        for line in issue.summary.lines().take(3) {
            let line = line.trim();
            if !line.is_empty() {
                println!("   {line}");
            }
        }
    }

    if !issue.aliases.is_empty() {
        println!("\n   Aliases: {}", issue.aliases.join(", "));
    }

    print_affected_versions(issue, package_name);
    print_references(issue);
    print_malware_origins(issue);

    if let Some(published) = issue.published {
        println!("\n   Published: {}", published.format("%Y-%m-%d"));
    }
    if let Some(modified) = issue.modified {
        println!("   Last Modified: {}", modified.format("%Y-%m-%d"));
    }
}

fn print_affected_versions(issue: &ClassifiedFinding, package_name: &str) {
    let relevant: Vec<_> = issue
        .affected
        .iter()
        .filter(|a| {
            a.package
                .as_ref()
                .and_then(|p| p.name.as_deref())
                .map(|name| name == package_name || name == format!("@{package_name}"))
                .unwrap_or(false)
        })
        .collect();

    if relevant.is_empty() {
        return;
    }

    println!("\n   Affected Versions:");
    for affected in relevant {
        for range in &affected.ranges {
            let kind = range.kind.as_deref().unwrap_or("UNKNOWN");
            let mut introduced = None;
            let mut fixed = None;
            let mut last_affected = None;
            for event in &range.events {
                if event.introduced.is_some() {
                    introduced = event.introduced.as_deref();
                } else if event.fixed.is_some() {
                    fixed = event.fixed.as_deref();
                } else if event.last_affected.is_some() {
                    last_affected = event.last_affected.as_deref();
                }
            }

            if let Some(introduced) = introduced {
                let mut line = format!("   - {kind}: ");
                if introduced == "0" {
                    line.push_str("All versions");
                } else {
                    line.push_str(&format!(">= {introduced}"));
                }
                if let Some(fixed) = fixed {
                    line.push_str(&format!(", fixed in {fixed}"));
                } else if let Some(last) = last_affected {
                    line.push_str(&format!(", last affected: {last}"));
                }
                println!("{line}");
            }
        }

        if !affected.versions.is_empty() {
            let shown: Vec<_> = affected.versions.iter().take(10).cloned().collect();
            println!("   - Specific versions: {}", shown.join(", "));
            if affected.versions.len() > 10 {
                println!("     ... and {} more", affected.versions.len() - 10);
            }
        }

        if let Some(sha) = affected.database_specific.get("sha256").and_then(Value::as_str) {
            println!("   - SHA256: {}...", truncate(sha, 32));
        }
        if let Some(source) = affected.database_specific.get("source").and_then(Value::as_str) {
            println!("   - Source: {source}");
        }
    }
}

fn print_references(issue: &ClassifiedFinding) {
    if issue.references.is_empty() {
        return;
    }

    println!("\n   References:");
    for reference in issue.references.iter().take(5) {
        let kind = reference.kind.as_deref().unwrap_or("WEB");
        let url = reference.url.as_deref().unwrap_or_default();
        println!("   - [{kind}] {url}");
    }
    if issue.references.len() > 5 {
        println!("   ... and {} more references", issue.references.len() - 5);
    }
}

fn print_malware_origins(issue: &ClassifiedFinding) {
    let Some(origins) = issue
        .database_specific
        .get("malicious-packages-origins")
        .and_then(Value::as_array)
    else {
        return;
    };
    if origins.is_empty() {
        return;
    }

    println!("\n   Malware Sources ({} detections):", origins.len());
    for origin in origins.iter().take(3) {
        let source = origin.get("source").and_then(Value::as_str).unwrap_or("unknown");
        println!("   - {source}");
        if let Some(sha) = origin.get("sha256").and_then(Value::as_str) {
            println!("     SHA256: {}...", truncate(sha, 32));
        }
    }
}

#[derive(Tabled)]
struct AffectedRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Type")]
    kind: &'static str,
    #[tabled(rename = "Issues")]
    issues: usize,
}

/// Prints per-package reports for a batch result, then the summary.
pub fn print_batch_report(result: &BatchScanResult, malware_only: bool) {
    for pkg in &result.malware_packages {
        let spec = crate::model::PackageSpec::parse(&pkg.package);
        print_package_report(&spec.name, spec.version.as_deref(), &pkg.findings, malware_only);
    }
    if !malware_only {
        for pkg in &result.vulnerable_packages {
            let spec = crate::model::PackageSpec::parse(&pkg.package);
            print_package_report(&spec.name, spec.version.as_deref(), &pkg.findings, false);
        }
    }

    println!("\n{RULE}");
    println!("{:^80}", "SCAN SUMMARY");
    println!("{RULE}");
    println!("Total packages scanned: {}", result.total_scanned);

    let mut rows: Vec<AffectedRow> = result
        .malware_packages
        .iter()
        .map(|p| AffectedRow {
            package: p.package.clone(),
            kind: "malware",
            issues: p.findings.len(),
        })
        .collect();
    if !malware_only {
        rows.extend(result.vulnerable_packages.iter().map(|p| AffectedRow {
            package: p.package.clone(),
            kind: "vulnerability",
            issues: p.findings.len(),
        }));
    }

    if rows.is_empty() {
        if malware_only {
            println!("\nNo malware detected");
        } else {
            println!("\nNo vulnerabilities or malware detected");
        }
        return;
    }

    if result.malware_count > 0 {
        println!("\nMALWARE DETECTED ({} packages)", result.malware_count);
    }
    if !malware_only && result.vulnerability_count > 0 {
        println!("VULNERABILITIES ({} packages)", result.vulnerability_count);
    }

    println!();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
}

/// Prints the summary for the sequential (non-batch) file scan, where
/// each package was scanned with its own query.
pub fn print_sequential_summary(results: &[ScanResult], malware_only: bool) {
    println!("\n{RULE}");
    println!("{:^80}", "SCAN SUMMARY");
    println!("{RULE}");
    println!("Total packages scanned: {}", results.len());

    let malware: Vec<_> = results
        .iter()
        .filter(|r| r.status == ScanStatus::MalwareDetected)
        .collect();
    let vulnerable: Vec<_> = results
        .iter()
        .filter(|r| r.status == ScanStatus::VulnerabilitiesDetected)
        .collect();

    if !malware.is_empty() {
        println!("\nMALWARE DETECTED ({} packages):", malware.len());
        for result in &malware {
            println!("   - {}", result.package);
        }
    }

    if !malware_only && !vulnerable.is_empty() {
        println!("\nVULNERABILITIES ({} packages):", vulnerable.len());
        for result in &vulnerable {
            println!("   - {}", result.package);
        }
    }

    if malware.is_empty() {
        if malware_only {
            println!("\nNo malware detected");
        } else if vulnerable.is_empty() {
            println!("\nNo vulnerabilities or malware detected");
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
