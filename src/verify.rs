//! Cross-check declared servers against what is actually installed.
//!
//! Read-only diagnostics: provider CLIs are queried, configuration is
//! never mutated.

use std::collections::BTreeMap;

use tracing::debug;

use crate::executor::GATEWAY_REMEDIATION;
use crate::models::{McpServerConfig, Provider};
use crate::runner::ProcessRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Connected,
    NotInstalled,
    GatewayNotConfigured,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub name: String,
    pub provider: Provider,
    pub status: VerificationStatus,
    /// What the user should do about a failing entry.
    pub remediation: Option<String>,
}

/// Classify every configured server by querying its provider once.
pub fn verify(
    installed: &BTreeMap<String, McpServerConfig>,
    runner: &dyn ProcessRunner,
) -> Vec<VerificationResult> {
    let mut results = Vec::new();

    let docker_names: Vec<&str> = installed
        .iter()
        .filter(|(_, c)| c.provider == Provider::Docker)
        .map(|(n, _)| n.as_str())
        .collect();
    let claude_names: Vec<&str> = installed
        .iter()
        .filter(|(_, c)| c.provider == Provider::Claude)
        .map(|(n, _)| n.as_str())
        .collect();

    if !docker_names.is_empty() {
        results.extend(verify_docker(&docker_names, runner));
    }
    if !claude_names.is_empty() {
        results.extend(verify_claude(&claude_names, runner));
    }

    results.sort_by(|a, b| a.name.cmp(&b.name));
    results
}

fn verify_docker(names: &[&str], runner: &dyn ProcessRunner) -> Vec<VerificationResult> {
    let status = runner.run("docker", &argv(&["mcp", "gateway", "status"]), &[]);
    let gateway_up = matches!(&status, Ok(out) if out.success);
    if !gateway_up {
        debug!("docker mcp gateway unavailable; marking all docker entries");
        return names
            .iter()
            .map(|name| VerificationResult {
                name: name.to_string(),
                provider: Provider::Docker,
                status: VerificationStatus::GatewayNotConfigured,
                remediation: Some(GATEWAY_REMEDIATION.to_string()),
            })
            .collect();
    }

    let enabled = runner
        .run("docker", &argv(&["mcp", "server", "list"]), &[])
        .map(|out| out.stdout)
        .unwrap_or_default();

    names
        .iter()
        .map(|name| {
            if list_contains(&enabled, name) {
                VerificationResult {
                    name: name.to_string(),
                    provider: Provider::Docker,
                    status: VerificationStatus::Connected,
                    remediation: None,
                }
            } else {
                VerificationResult {
                    name: name.to_string(),
                    provider: Provider::Docker,
                    status: VerificationStatus::NotInstalled,
                    remediation: Some(format!(
                        "Run `docker mcp server enable {name}` or `bwc add mcp {name}` to re-install."
                    )),
                }
            }
        })
        .collect()
}

fn verify_claude(names: &[&str], runner: &dyn ProcessRunner) -> Vec<VerificationResult> {
    let listed = runner
        .run("claude", &argv(&["mcp", "list"]), &[])
        .ok()
        .filter(|out| out.success)
        .map(|out| out.stdout);

    names
        .iter()
        .map(|name| match &listed {
            Some(stdout) if list_contains(stdout, name) => VerificationResult {
                name: name.to_string(),
                provider: Provider::Claude,
                status: VerificationStatus::Connected,
                remediation: None,
            },
            _ => VerificationResult {
                name: name.to_string(),
                provider: Provider::Claude,
                status: VerificationStatus::NotInstalled,
                remediation: Some(format!(
                    "Run `bwc add mcp {name}` to register the server with the claude CLI."
                )),
            },
        })
        .collect()
}

/// Match a name as its own token so `redis` does not match `redis-cloud`.
fn list_contains(stdout: &str, name: &str) -> bool {
    stdout.lines().any(|line| {
        line.split(|c: char| c.is_whitespace() || c == ':' || c == ',')
            .any(|tok| tok == name)
    })
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Scope, ServerEndpoint};
    use crate::runner::fake::FakeRunner;
    use chrono::Utc;

    fn server(provider: Provider) -> McpServerConfig {
        McpServerConfig {
            provider,
            scope: Scope::Local,
            endpoint: ServerEndpoint::Stdio {
                command: String::new(),
                args: vec![],
                env: Default::default(),
            },
            verification_status: None,
            installed_at: Utc::now(),
        }
    }

    #[test]
    fn docker_entries_split_into_connected_and_not_installed() {
        let installed = BTreeMap::from([
            ("redis".to_string(), server(Provider::Docker)),
            ("github".to_string(), server(Provider::Docker)),
        ]);
        let runner = FakeRunner::new().respond(
            "docker mcp server list",
            FakeRunner::ok_with_stdout("redis: running\n"),
        );

        let results = verify(&installed, &runner);
        assert_eq!(results.len(), 2);
        let github = results.iter().find(|r| r.name == "github").unwrap();
        assert_eq!(github.status, VerificationStatus::NotInstalled);
        assert!(github.remediation.as_deref().unwrap().contains("github"));
        let redis = results.iter().find(|r| r.name == "redis").unwrap();
        assert_eq!(redis.status, VerificationStatus::Connected);
        assert!(redis.remediation.is_none());
    }

    #[test]
    fn gateway_down_marks_every_docker_entry() {
        let installed = BTreeMap::from([
            ("redis".to_string(), server(Provider::Docker)),
            ("github".to_string(), server(Provider::Docker)),
        ]);
        let runner = FakeRunner::new().respond(
            "docker mcp gateway status",
            FakeRunner::fail_with_stderr("not running"),
        );

        let results = verify(&installed, &runner);
        assert!(results
            .iter()
            .all(|r| r.status == VerificationStatus::GatewayNotConfigured));
        assert!(results.iter().all(|r| r.remediation.is_some()));
        // `server list` is never consulted when the gateway is down.
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn claude_entries_check_mcp_list_membership() {
        let installed = BTreeMap::from([
            ("api".to_string(), server(Provider::Claude)),
            ("db".to_string(), server(Provider::Claude)),
        ]);
        let runner = FakeRunner::new().respond(
            "claude mcp list",
            FakeRunner::ok_with_stdout("api: https://x/sse (SSE) - Connected\n"),
        );

        let results = verify(&installed, &runner);
        let api = results.iter().find(|r| r.name == "api").unwrap();
        assert_eq!(api.status, VerificationStatus::Connected);
        let db = results.iter().find(|r| r.name == "db").unwrap();
        assert_eq!(db.status, VerificationStatus::NotInstalled);
    }

    #[test]
    fn token_matching_avoids_prefix_collisions() {
        assert!(list_contains("redis: running", "redis"));
        assert!(!list_contains("redis-cloud: running", "redis"));
    }

    #[test]
    fn no_entries_means_no_subprocess_calls() {
        let runner = FakeRunner::new();
        let results = verify(&BTreeMap::new(), &runner);
        assert!(results.is_empty());
        assert!(runner.calls.borrow().is_empty());
    }
}
