use futures::future::join_all;

use crate::classifier::{classify, ClassifiedFinding};
use crate::github::SourceHost;
use crate::lockfile::DependencyMap;
use crate::model::{strip_version_operators, PackageSpec};
use crate::osv::{Vuln, VulnDatabase};

use super::{
    AffectedPackage, AffectedRepository, BatchScanResult, IssueSummary, OrgScanResult,
    RepoScanResult, ScanResult, ScanStatus,
};

/// Hard ceiling on repositories scanned during an organization scan,
/// unless the caller overrides it.
pub const DEFAULT_MAX_REPOS: usize = 50;

/// Drives every scan workflow against a vulnerability database.
///
/// Stateless apart from the detail cache the database implementation may
/// carry; each call builds and consumes its own data.
pub struct ScanEngine<D> {
    db: D,
}

impl<D: VulnDatabase> ScanEngine<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    /// Scans a single package spec (`name` or `name@version`).
    pub async fn scan_package(&self, spec: &str, malware_only: bool) -> ScanResult {
        let parsed = PackageSpec::parse(spec);
        let vulns = self
            .db
            .query(&parsed.name, parsed.version.as_deref())
            .await
            .and_then(|r| r.vulns)
            .unwrap_or_default();

        if vulns.is_empty() {
            return ScanResult::clean(spec);
        }

        let (malware, vulnerabilities) = partition(&vulns);
        let status = status_of(&malware, &vulnerabilities);
        let malware_count = malware.len();

        let mut findings = malware;
        if !malware_only {
            findings.extend(vulnerabilities.iter().cloned());
        }

        ScanResult {
            package: spec.to_string(),
            status,
            malware_count,
            vulnerability_count: vulnerabilities.len(),
            issues: findings.iter().map(IssueSummary::from).collect(),
            findings,
        }
    }

    /// Scans a dependency map with one batch query.
    ///
    /// An empty map short-circuits to a clean result without touching the
    /// database. Batch results carry no identifiers, so the i-th result is
    /// matched to the i-th entry of the snapshot the query was built from.
    pub async fn scan_dependencies(
        &self,
        deps: &DependencyMap,
        malware_only: bool,
    ) -> BatchScanResult {
        if deps.is_empty() {
            return BatchScanResult::empty();
        }

        // One snapshot serves both query construction and result matching.
        let queries: Vec<(String, String)> = deps
            .iter()
            .map(|(name, version)| (name.clone(), version.clone()))
            .collect();

        let Some(batch) = self.db.query_batch(&queries).await else {
            return BatchScanResult::failed(deps.len(), "batch query failed");
        };

        let mut malware_packages = Vec::new();
        let mut vulnerable_packages = Vec::new();

        for (i, result) in batch.results.into_iter().enumerate() {
            let Some((name, version)) = queries.get(i) else {
                tracing::warn!(index = i, "batch response longer than query list");
                break;
            };
            let vulns = result.vulns.unwrap_or_default();
            if vulns.is_empty() {
                continue;
            }

            let (malware, vulnerabilities) = partition(&vulns);
            let package = format!("{name}@{version}");

            if !malware.is_empty() {
                malware_packages.push(AffectedPackage {
                    package: package.clone(),
                    malware_count: Some(malware.len()),
                    vulnerability_count: None,
                    issues: malware.iter().map(IssueSummary::from).collect(),
                    findings: malware,
                });
            }
            if !vulnerabilities.is_empty() && !malware_only {
                vulnerable_packages.push(AffectedPackage {
                    package,
                    malware_count: None,
                    vulnerability_count: Some(vulnerabilities.len()),
                    issues: vulnerabilities.iter().map(IssueSummary::from).collect(),
                    findings: vulnerabilities,
                });
            }
        }

        let status = if !malware_packages.is_empty() {
            ScanStatus::MalwareDetected
        } else if !vulnerable_packages.is_empty() {
            ScanStatus::VulnerabilitiesDetected
        } else {
            ScanStatus::Clean
        };

        BatchScanResult {
            status,
            total_scanned: deps.len(),
            malware_count: malware_packages.len(),
            vulnerability_count: vulnerable_packages.len(),
            malware_packages,
            vulnerable_packages,
            error: None,
        }
    }

    /// Scans a dependency map with one single query per package, in map
    /// order. Slower than [`scan_dependencies`](Self::scan_dependencies)
    /// but yields a per-package [`ScanResult`] for detailed reporting.
    pub async fn scan_each(&self, deps: &DependencyMap, malware_only: bool) -> Vec<ScanResult> {
        let mut results = Vec::with_capacity(deps.len());
        for (name, version) in deps {
            let version = strip_version_operators(version);
            let spec = if version.is_empty() {
                name.clone()
            } else {
                format!("{name}@{version}")
            };
            results.push(self.scan_package(&spec, malware_only).await);
        }
        results
    }

    /// Scans one repository's dependency files via the source host.
    pub async fn scan_repository(
        &self,
        host: &dyn SourceHost,
        owner: &str,
        repo: &str,
        malware_only: bool,
    ) -> RepoScanResult {
        let repository = format!("{owner}/{repo}");
        let deps = host.repo_dependencies(owner, repo).await;

        if deps.is_empty() {
            return RepoScanResult {
                scan: BatchScanResult::failed(
                    0,
                    format!(
                        "no dependencies found in {repository}; the repository may not have \
                         a package.json or may not be accessible"
                    ),
                ),
                repository,
            };
        }

        RepoScanResult {
            scan: self.scan_dependencies(&deps, malware_only).await,
            repository,
        }
    }

    /// Scans every repository of an organization with one org-wide batch.
    ///
    /// Per-repository dependency fetches fan out concurrently but are
    /// merged in listing order with first-seen-wins on version conflicts.
    /// Affected packages are then mapped back to every repository whose
    /// dependency map names them.
    pub async fn scan_organization(
        &self,
        host: &dyn SourceHost,
        org: &str,
        malware_only: bool,
        max_repos: usize,
    ) -> OrgScanResult {
        let mut repos = host.list_repositories(org).await;

        if repos.is_empty() {
            return OrgScanResult {
                status: ScanStatus::Error,
                organization: org.to_string(),
                repositories_scanned: 0,
                repositories_with_dependencies: 0,
                repositories_affected: 0,
                total_unique_dependencies: 0,
                malware_count: 0,
                vulnerability_count: 0,
                affected_repositories: Vec::new(),
                error: Some(format!(
                    "no repositories found for organization {org} or insufficient permissions"
                )),
            };
        }

        repos.truncate(max_repos);

        // join_all preserves input order, so the merge below stays
        // deterministic even though the fetches run concurrently.
        let dep_maps = join_all(
            repos
                .iter()
                .map(|r| host.repo_dependencies(&r.owner, &r.name)),
        )
        .await;

        let mut org_dependencies = DependencyMap::new();
        let mut repo_dependency_map: Vec<(String, DependencyMap)> = Vec::new();

        for (repo, deps) in repos.iter().zip(dep_maps) {
            if deps.is_empty() {
                continue;
            }
            for (name, version) in &deps {
                org_dependencies
                    .entry(name.clone())
                    .or_insert_with(|| version.clone());
            }
            repo_dependency_map.push((repo.name.clone(), deps));
        }

        if org_dependencies.is_empty() {
            return OrgScanResult {
                status: ScanStatus::Clean,
                organization: org.to_string(),
                repositories_scanned: repos.len(),
                repositories_with_dependencies: 0,
                repositories_affected: 0,
                total_unique_dependencies: 0,
                malware_count: 0,
                vulnerability_count: 0,
                affected_repositories: Vec::new(),
                error: None,
            };
        }

        let scan = self.scan_dependencies(&org_dependencies, malware_only).await;

        // Repository -> affected packages index, sorted by repository name
        // for a deterministic report.
        let mut affected: std::collections::BTreeMap<String, Vec<AffectedPackage>> =
            std::collections::BTreeMap::new();

        let mut map_back = |packages: &[AffectedPackage]| {
            for pkg in packages {
                let name = PackageSpec::parse(&pkg.package).name;
                for (repo_name, deps) in &repo_dependency_map {
                    if deps.contains_key(&name) {
                        affected.entry(repo_name.clone()).or_default().push(pkg.clone());
                    }
                }
            }
        };

        map_back(&scan.malware_packages);
        if !malware_only {
            map_back(&scan.vulnerable_packages);
        }

        OrgScanResult {
            status: scan.status,
            organization: org.to_string(),
            repositories_scanned: repos.len(),
            repositories_with_dependencies: repo_dependency_map.len(),
            repositories_affected: affected.len(),
            total_unique_dependencies: org_dependencies.len(),
            malware_count: scan.malware_count,
            vulnerability_count: scan.vulnerability_count,
            affected_repositories: affected
                .into_iter()
                .map(|(repository, affected_packages)| AffectedRepository {
                    repository,
                    affected_packages,
                })
                .collect(),
            error: None,
        }
    }
}

fn partition(vulns: &[Vuln]) -> (Vec<ClassifiedFinding>, Vec<ClassifiedFinding>) {
    vulns.iter().map(classify).partition(|f| f.is_malware)
}

fn status_of(malware: &[ClassifiedFinding], vulnerabilities: &[ClassifiedFinding]) -> ScanStatus {
    if !malware.is_empty() {
        ScanStatus::MalwareDetected
    } else if !vulnerabilities.is_empty() {
        ScanStatus::VulnerabilitiesDetected
    } else {
        ScanStatus::Clean
    }
}
