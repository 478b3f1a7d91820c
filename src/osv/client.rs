use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::cache::DetailCache;
use crate::model::strip_version_operators;

use super::{BatchResponse, QueryResponse, Vuln};

/// Base URL of the OSV.dev v1 API.
pub const OSV_API_URL: &str = "https://api.osv.dev/v1";

const USER_AGENT: &str = concat!("roguepkg/", env!("CARGO_PKG_VERSION"));

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const BATCH_TIMEOUT: Duration = Duration::from_secs(60);
const DETAIL_TIMEOUT: Duration = Duration::from_secs(10);

/// The remote vulnerability database, reduced to the three operations the
/// scanner needs. Scans are generic over this trait so tests can supply
/// stubs.
#[async_trait]
pub trait VulnDatabase: Send + Sync {
    /// Queries findings for one package, optionally pinned to a version.
    async fn query(&self, name: &str, version: Option<&str>) -> Option<QueryResponse>;

    /// Queries many packages in one call. Results are positionally aligned
    /// with `packages`; implementations must preserve that order.
    async fn query_batch(&self, packages: &[(String, String)]) -> Option<BatchResponse>;

    /// Fetches the full record for a finding identifier.
    async fn vuln_detail(&self, id: &str) -> Option<Vuln>;
}

/// OSV.dev client over plain request/response HTTP.
///
/// Every operation fails soft: errors are logged and surface as `None`.
pub struct OsvClient {
    client: reqwest::Client,
    base_url: String,
    cache: DetailCache,
}

#[derive(Serialize)]
struct PackageRef<'a> {
    name: &'a str,
    ecosystem: &'static str,
}

#[derive(Serialize)]
struct QueryPayload<'a> {
    package: PackageRef<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
}

#[derive(Serialize)]
struct BatchPayload<'a> {
    queries: Vec<QueryPayload<'a>>,
}

impl OsvClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            cache: DetailCache::new(),
        }
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &impl Serialize,
        timeout: Duration,
    ) -> Option<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = match self
            .client
            .post(&url)
            .json(payload)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "OSV request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(endpoint, status = %response.status(), "OSV API error");
            return None;
        }

        match response.json().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "failed to decode OSV response");
                None
            }
        }
    }
}

impl Default for OsvClient {
    fn default() -> Self {
        Self::new(OSV_API_URL)
    }
}

#[async_trait]
impl VulnDatabase for OsvClient {
    async fn query(&self, name: &str, version: Option<&str>) -> Option<QueryResponse> {
        let payload = QueryPayload {
            package: PackageRef {
                name,
                ecosystem: "npm",
            },
            version,
        };
        self.post_json("query", &payload, QUERY_TIMEOUT).await
    }

    async fn query_batch(&self, packages: &[(String, String)]) -> Option<BatchResponse> {
        let queries: Vec<QueryPayload<'_>> = packages
            .iter()
            .map(|(name, version)| {
                let version = strip_version_operators(version);
                QueryPayload {
                    package: PackageRef {
                        name,
                        ecosystem: "npm",
                    },
                    version: (!version.is_empty()).then_some(version),
                }
            })
            .collect();

        let payload = BatchPayload { queries };
        let mut response: BatchResponse = self.post_json("querybatch", &payload, BATCH_TIMEOUT).await?;

        // Batch results are minimal records; enrich each one with the full
        // detail fetch, keeping the minimal record when that fails.
        for result in &mut response.results {
            let Some(vulns) = result.vulns.take() else {
                continue;
            };
            let mut enriched = Vec::with_capacity(vulns.len());
            for vuln in vulns {
                match self.vuln_detail(&vuln.id).await {
                    Some(full) => enriched.push(full),
                    None => enriched.push(vuln),
                }
            }
            result.vulns = Some(enriched);
        }

        Some(response)
    }

    async fn vuln_detail(&self, id: &str) -> Option<Vuln> {
        if let Some(cached) = self.cache.get(id) {
            return Some(cached);
        }

        let url = format!("{}/vulns/{}", self.base_url, id);
        let response = match self.client.get(&url).timeout(DETAIL_TIMEOUT).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(id, error = %e, "OSV detail request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            return None;
        }

        match response.json::<Vuln>().await {
            Ok(vuln) => {
                self.cache.insert(id, vuln.clone());
                Some(vuln)
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "failed to decode OSV detail response");
                None
            }
        }
    }
}
