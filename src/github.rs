//! GitHub integration: file fetch and organization repository listing.
//!
//! The host is treated as a black-box collaborator behind [`SourceHost`];
//! every failure is soft (logged, empty result) so a partial organization
//! scan can still complete.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::lockfile::{manifest, package_lock, DependencyMap};

/// Base URL of the GitHub REST API.
pub const GITHUB_API_URL: &str = "https://api.github.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PER_PAGE: usize = 100;

/// Hard ceiling on organization listing pages per scan.
const MAX_PAGES: usize = 10;

/// A repository as returned by the organization listing.
#[derive(Debug, Clone, Serialize)]
pub struct RepoInfo {
    pub name: String,
    pub full_name: String,
    pub owner: String,
    pub default_branch: String,
    pub language: Option<String>,
    pub private: bool,
}

/// Source-hosting service: raw file fetch plus repository listing.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Fetches raw file content, or `None` when missing/unreachable.
    async fn fetch_file(&self, owner: &str, repo: &str, path: &str, branch: &str)
        -> Option<String>;

    /// Lists an organization's repositories (paginated internally).
    async fn list_repositories(&self, org: &str) -> Vec<RepoInfo>;

    /// Collects a repository's npm dependencies from its manifest and
    /// lockfile; lockfile entries overwrite manifest entries.
    async fn repo_dependencies(&self, owner: &str, repo: &str) -> DependencyMap {
        let mut deps = DependencyMap::new();

        if let Some(content) = self.fetch_file(owner, repo, "package.json", "main").await {
            deps.extend(manifest::parse(&content));
        }
        if let Some(content) = self
            .fetch_file(owner, repo, "package-lock.json", "main")
            .await
        {
            deps.extend(package_lock::parse(&content));
        }

        deps
    }
}

pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ApiRepo {
    name: String,
    full_name: String,
    owner: ApiOwner,
    default_branch: Option<String>,
    language: Option<String>,
    #[serde(default)]
    private: bool,
}

#[derive(Deserialize)]
struct ApiOwner {
    login: String,
}

enum Fetch {
    Found(String),
    NotFound,
    Failed,
}

impl GitHubClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(url)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .timeout(REQUEST_TIMEOUT);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn fetch_once(&self, owner: &str, repo: &str, path: &str, branch: &str) -> Fetch {
        let url = format!("{}/repos/{owner}/{repo}/contents/{path}", self.base_url);
        let response = match self
            .request(&url)
            // The raw media type skips the base64 content envelope.
            .header("Accept", "application/vnd.github.raw+json")
            .query(&[("ref", branch)])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(owner, repo, path, error = %e, "GitHub file fetch failed");
                return Fetch::Failed;
            }
        };

        let status = response.status();
        if status.is_success() {
            match response.text().await {
                Ok(content) => Fetch::Found(content),
                Err(e) => {
                    tracing::warn!(owner, repo, path, error = %e, "failed to read file body");
                    Fetch::Failed
                }
            }
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Fetch::NotFound
        } else {
            tracing::warn!(owner, repo, path, status = %status, "GitHub API error");
            Fetch::Failed
        }
    }
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn fetch_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: &str,
    ) -> Option<String> {
        match self.fetch_once(owner, repo, path, branch).await {
            Fetch::Found(content) => Some(content),
            // Repositories created before the default-branch rename still
            // use "master"; fall back once.
            Fetch::NotFound if branch == "main" => {
                match self.fetch_once(owner, repo, path, "master").await {
                    Fetch::Found(content) => Some(content),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    async fn list_repositories(&self, org: &str) -> Vec<RepoInfo> {
        let url = format!("{}/orgs/{org}/repos", self.base_url);
        let mut repos = Vec::new();

        for page in 1..=MAX_PAGES {
            let response = match self
                .request(&url)
                .header("Accept", "application/vnd.github+json")
                .query(&[
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                    ("type", "all".to_string()),
                ])
                .send()
                .await
            {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    tracing::warn!(org, page, status = %r.status(), "GitHub org listing error");
                    break;
                }
                Err(e) => {
                    tracing::warn!(org, page, error = %e, "GitHub org listing failed");
                    break;
                }
            };

            let batch: Vec<ApiRepo> = match response.json().await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(org, page, error = %e, "failed to decode org listing");
                    break;
                }
            };
            if batch.is_empty() {
                break;
            }

            repos.extend(batch.into_iter().map(|r| RepoInfo {
                name: r.name,
                full_name: r.full_name,
                owner: r.owner.login,
                default_branch: r.default_branch.unwrap_or_else(|| "main".to_string()),
                language: r.language,
                private: r.private,
            }));
        }

        repos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixtureHost;

    #[async_trait]
    impl SourceHost for FixtureHost {
        async fn fetch_file(
            &self,
            _owner: &str,
            _repo: &str,
            path: &str,
            _branch: &str,
        ) -> Option<String> {
            match path {
                "package.json" => Some(
                    r#"{"dependencies": {"lodash": "^4.17.0", "express": "^4.18.0"}}"#.to_string(),
                ),
                "package-lock.json" => Some(
                    r#"{"packages": {
                        "": {},
                        "node_modules/lodash": {"name": "lodash", "version": "4.17.21"}
                    }}"#
                    .to_string(),
                ),
                _ => None,
            }
        }

        async fn list_repositories(&self, _org: &str) -> Vec<RepoInfo> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_repo_dependencies_lockfile_wins() {
        let deps = FixtureHost.repo_dependencies("acme", "web").await;
        assert_eq!(deps.len(), 2);
        // manifest range replaced by the pinned lockfile version
        assert_eq!(deps["lodash"], "4.17.21");
        assert_eq!(deps["express"], "^4.18.0");
    }
}
