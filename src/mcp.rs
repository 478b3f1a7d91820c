//! MCP (Model Context Protocol) server over line-delimited JSON-RPC 2.0
//! on stdio.
//!
//! One request per line in, one reply per line out; logs go to stderr so
//! stdout stays a clean protocol channel. A malformed request produces an
//! error reply carrying the original id when one was present, and the
//! serve loop never terminates on bad input.

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::github::SourceHost;
use crate::lockfile::DependencyMap;
use crate::osv::VulnDatabase;
use crate::scan::{ScanEngine, DEFAULT_MAX_REPOS};

pub const PROTOCOL_VERSION: &str = "2025-06-18";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INTERNAL_ERROR: i64 = -32603;

pub struct McpServer<D> {
    engine: ScanEngine<D>,
    github: Option<Box<dyn SourceHost>>,
    default_max_repos: usize,
}

impl<D: VulnDatabase> McpServer<D> {
    pub fn new(engine: ScanEngine<D>, github: Option<Box<dyn SourceHost>>) -> Self {
        if github.is_none() {
            tracing::warn!("GITHUB_TOKEN not set; GitHub scan tools will be unavailable");
        }
        Self {
            engine,
            github,
            default_max_repos: DEFAULT_MAX_REPOS,
        }
    }

    /// Overrides the default repository cap for organization scans.
    pub fn max_repos(mut self, max_repos: usize) -> Self {
        self.default_max_repos = max_repos;
        self
    }

    /// Serves requests from stdin until it closes.
    pub async fn serve(&self) -> anyhow::Result<()> {
        tracing::info!("MCP server started, listening on stdio");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(reply) = self.handle_line(line).await {
                stdout.write_all(serde_json::to_string(&reply)?.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }

    /// Handles one request line; `None` means no reply (notifications).
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let request: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                return Some(error_reply(None, PARSE_ERROR, format!("invalid JSON: {e}")));
            }
        };

        let id = request.get("id").cloned();
        let method = request.get("method").and_then(Value::as_str).unwrap_or_default();

        match method {
            "initialize" => Some(result_reply(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": "roguepkg",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )),
            "notifications/initialized" => None,
            "ping" => Some(result_reply(id, json!({}))),
            "tools/list" => Some(result_reply(id, json!({"tools": tool_descriptors()}))),
            "tools/call" => {
                let params = request.get("params").cloned().unwrap_or(Value::Null);
                let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
                let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

                match self.call_tool(name, &arguments).await {
                    Ok(result) => {
                        let text = serde_json::to_string_pretty(&result)
                            .unwrap_or_else(|_| result.to_string());
                        Some(result_reply(
                            id,
                            json!({"content": [{"type": "text", "text": text}]}),
                        ))
                    }
                    Err(message) => Some(error_reply(id, INTERNAL_ERROR, message)),
                }
            }
            other => {
                tracing::warn!(method = other, "unknown MCP method");
                Some(error_reply(
                    id,
                    METHOD_NOT_FOUND,
                    format!("unknown method: {other}"),
                ))
            }
        }
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Value, String> {
        let malware_only = |default: bool| {
            arguments
                .get("malware_only")
                .and_then(Value::as_bool)
                .unwrap_or(default)
        };

        let result = match name {
            "scan_package" => {
                let package = required_str(arguments, "package")?;
                let result = self.engine.scan_package(package, malware_only(false)).await;
                to_value(&result)?
            }
            "scan_github_repository" => {
                let owner = required_str(arguments, "owner")?;
                let repo = required_str(arguments, "repository")?;
                let github = self.github()?;
                let result = self
                    .engine
                    .scan_repository(github, owner, repo, malware_only(false))
                    .await;
                to_value(&result)?
            }
            "scan_github_organization" => {
                let org = required_str(arguments, "organization")?;
                let max_repos = arguments
                    .get("max_repos")
                    .and_then(Value::as_u64)
                    .map(|n| n as usize)
                    .unwrap_or(self.default_max_repos);
                let github = self.github()?;
                let result = self
                    .engine
                    .scan_organization(github, org, malware_only(true), max_repos)
                    .await;
                to_value(&result)?
            }
            "scan_dependencies" => {
                let deps: DependencyMap = arguments
                    .get("dependencies")
                    .cloned()
                    .ok_or("missing required argument: dependencies")
                    .and_then(|v| {
                        serde_json::from_value(v)
                            .map_err(|_| "dependencies must be a map of package names to versions")
                    })?;
                let result = self
                    .engine
                    .scan_dependencies(&deps, malware_only(false))
                    .await;
                to_value(&result)?
            }
            other => return Err(format!("unknown tool: {other}")),
        };

        // Result bodies that carry an error field surface as protocol
        // errors, matching how input problems are reported per request.
        if let Some(message) = result.get("error").and_then(Value::as_str) {
            return Err(message.to_string());
        }

        Ok(result)
    }

    fn github(&self) -> Result<&dyn SourceHost, String> {
        self.github.as_deref().ok_or_else(|| {
            "GitHub integration not initialized; set the GITHUB_TOKEN environment variable"
                .to_string()
        })
    }
}

fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, String> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("missing required argument: {key}"))
}

fn to_value(result: &impl serde::Serialize) -> Result<Value, String> {
    serde_json::to_value(result).map_err(|e| format!("failed to serialize result: {e}"))
}

fn result_reply(id: Option<Value>, result: Value) -> Value {
    let mut reply = Map::new();
    reply.insert("jsonrpc".into(), json!("2.0"));
    if let Some(id) = id {
        reply.insert("id".into(), id);
    }
    reply.insert("result".into(), result);
    Value::Object(reply)
}

fn error_reply(id: Option<Value>, code: i64, message: String) -> Value {
    let mut reply = Map::new();
    reply.insert("jsonrpc".into(), json!("2.0"));
    if let Some(id) = id {
        reply.insert("id".into(), id);
    }
    reply.insert("error".into(), json!({"code": code, "message": message}));
    Value::Object(reply)
}

fn tool_descriptors() -> Value {
    json!([
        {
            "name": "scan_package",
            "description": "Scan a single npm package for vulnerabilities and malware",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "package": {
                        "type": "string",
                        "description": "Package specification (e.g. 'lodash@4.17.21' or 'lodash')"
                    },
                    "malware_only": {
                        "type": "boolean",
                        "description": "Only report malware, skip regular vulnerabilities",
                        "default": false
                    }
                },
                "required": ["package"]
            }
        },
        {
            "name": "scan_github_repository",
            "description": "Scan a GitHub repository's dependencies for vulnerabilities and malware",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "owner": {
                        "type": "string",
                        "description": "Repository owner (user or organization)"
                    },
                    "repository": {
                        "type": "string",
                        "description": "Repository name"
                    },
                    "malware_only": {
                        "type": "boolean",
                        "description": "Only report malware",
                        "default": false
                    }
                },
                "required": ["owner", "repository"]
            }
        },
        {
            "name": "scan_github_organization",
            "description": "Scan all repositories in a GitHub organization for vulnerabilities and malware",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "organization": {
                        "type": "string",
                        "description": "Organization name"
                    },
                    "malware_only": {
                        "type": "boolean",
                        "description": "Only report malware (recommended for org-wide scans)",
                        "default": true
                    },
                    "max_repos": {
                        "type": "integer",
                        "description": "Maximum number of repositories to scan",
                        "default": DEFAULT_MAX_REPOS
                    }
                },
                "required": ["organization"]
            }
        },
        {
            "name": "scan_dependencies",
            "description": "Scan a list of dependencies for vulnerabilities and malware",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "dependencies": {
                        "type": "object",
                        "description": "Map of package names to versions (e.g. {\"lodash\": \"4.17.21\"})"
                    },
                    "malware_only": {
                        "type": "boolean",
                        "description": "Only report malware",
                        "default": false
                    }
                },
                "required": ["dependencies"]
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::osv::{BatchResponse, QueryResponse, Vuln};

    struct StubDb;

    #[async_trait]
    impl VulnDatabase for StubDb {
        async fn query(&self, _name: &str, _version: Option<&str>) -> Option<QueryResponse> {
            Some(QueryResponse { vulns: None })
        }

        async fn query_batch(&self, packages: &[(String, String)]) -> Option<BatchResponse> {
            Some(BatchResponse {
                results: packages.iter().map(|_| Default::default()).collect(),
            })
        }

        async fn vuln_detail(&self, _id: &str) -> Option<Vuln> {
            None
        }
    }

    fn server() -> McpServer<StubDb> {
        McpServer::new(ScanEngine::new(StubDb), None)
    }

    #[tokio::test]
    async fn test_initialize_handshake() {
        let reply = server()
            .handle_line(r#"{"jsonrpc": "2.0", "id": 1, "method": "initialize"}"#)
            .await
            .unwrap();

        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(reply["result"]["serverInfo"]["name"], "roguepkg");
    }

    #[tokio::test]
    async fn test_initialized_notification_has_no_reply() {
        let reply = server()
            .handle_line(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#)
            .await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_ping() {
        let reply = server()
            .handle_line(r#"{"jsonrpc": "2.0", "id": 7, "method": "ping"}"#)
            .await
            .unwrap();
        assert_eq!(reply["result"], json!({}));
    }

    #[tokio::test]
    async fn test_tools_list_has_four_tools() {
        let reply = server()
            .handle_line(r#"{"jsonrpc": "2.0", "id": 2, "method": "tools/list"}"#)
            .await
            .unwrap();

        let tools = reply["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 4);
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec![
                "scan_package",
                "scan_github_repository",
                "scan_github_organization",
                "scan_dependencies"
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_json_yields_parse_error() {
        let reply = server().handle_line("{nope").await.unwrap();
        assert_eq!(reply["error"]["code"], PARSE_ERROR);
        assert!(reply.get("id").is_none());
    }

    #[tokio::test]
    async fn test_unknown_method_keeps_id() {
        let reply = server()
            .handle_line(r#"{"jsonrpc": "2.0", "id": "abc", "method": "bogus"}"#)
            .await
            .unwrap();
        assert_eq!(reply["id"], "abc");
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_reply() {
        let reply = server()
            .handle_line(
                r#"{"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                    "params": {"name": "bogus_tool", "arguments": {}}}"#,
            )
            .await
            .unwrap();
        assert_eq!(reply["id"], 3);
        assert_eq!(reply["error"]["code"], INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn test_scan_package_tool_wraps_text_content() {
        let reply = server()
            .handle_line(
                r#"{"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                    "params": {"name": "scan_package", "arguments": {"package": "lodash@4.17.21"}}}"#,
            )
            .await
            .unwrap();

        let content = &reply["result"]["content"][0];
        assert_eq!(content["type"], "text");
        let body: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["status"], "clean");
        assert_eq!(body["package"], "lodash@4.17.21");
    }

    #[tokio::test]
    async fn test_scan_package_missing_argument() {
        let reply = server()
            .handle_line(
                r#"{"jsonrpc": "2.0", "id": 5, "method": "tools/call",
                    "params": {"name": "scan_package", "arguments": {}}}"#,
            )
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn test_github_tool_without_token() {
        let reply = server()
            .handle_line(
                r#"{"jsonrpc": "2.0", "id": 6, "method": "tools/call",
                    "params": {"name": "scan_github_repository",
                               "arguments": {"owner": "acme", "repository": "web"}}}"#,
            )
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], INTERNAL_ERROR);
        assert!(reply["error"]["message"]
            .as_str()
            .unwrap()
            .contains("GITHUB_TOKEN"));
    }

    #[tokio::test]
    async fn test_scan_dependencies_tool() {
        let reply = server()
            .handle_line(
                r#"{"jsonrpc": "2.0", "id": 8, "method": "tools/call",
                    "params": {"name": "scan_dependencies",
                               "arguments": {"dependencies": {"lodash": "4.17.21"}}}}"#,
            )
            .await
            .unwrap();

        let body: Value =
            serde_json::from_str(reply["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["status"], "clean");
        assert_eq!(body["total_scanned"], 1);
    }
}
