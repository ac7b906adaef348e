//! Provider side effects: docker gateway enablement, claude CLI
//! registration, or manual instructions.

use serde_json::Value;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::models::{Scope, ServerEndpoint};
use crate::runner::ProcessRunner;

pub const GATEWAY_REMEDIATION: &str =
    "Run `docker mcp gateway run` once, restart your MCP client, then re-enable the server.";

/// Provider action resolved for one install.
#[derive(Debug)]
pub enum PlanAction {
    /// Enable the server by name through the container gateway.
    DockerGateway,
    /// Register the server with the claude CLI.
    ClaudeCli { endpoint: ServerEndpoint },
    /// No side effect; surface documented steps.
    Manual { steps: Vec<String> },
}

/// Ephemeral product of selector + input pipeline, consumed by `execute`.
/// Never persisted; its outcome is recorded as an `McpServerConfig`.
#[derive(Debug)]
pub struct InstallPlan {
    pub name: String,
    pub scope: Scope,
    pub action: PlanAction,
    /// Rendered connection-spec template, used for the shared manifest.
    pub rendered: Value,
    /// Environment exported to the provider subprocess.
    pub env_exports: Vec<(String, String)>,
}

#[derive(Debug, PartialEq)]
pub enum InstallOutcome {
    Installed,
    /// The gateway is missing; carries what the user should do about it.
    GatewayNotConfigured { remediation: String },
    ManualSteps(Vec<String>),
}

/// Perform the provider action for `plan`.
pub fn execute(plan: &InstallPlan, runner: &dyn ProcessRunner) -> Result<InstallOutcome> {
    match &plan.action {
        PlanAction::DockerGateway => execute_docker(plan, runner),
        PlanAction::ClaudeCli { endpoint } => execute_claude(plan, endpoint, runner),
        PlanAction::Manual { steps } => Ok(InstallOutcome::ManualSteps(steps.clone())),
    }
}

fn execute_docker(plan: &InstallPlan, runner: &dyn ProcessRunner) -> Result<InstallOutcome> {
    let status = runner.run("docker", &args(&["mcp", "gateway", "status"]), &[]);
    let configured = matches!(status, Ok(out) if out.success);
    if !configured {
        debug!(server = %plan.name, "docker mcp gateway not configured");
        return Ok(InstallOutcome::GatewayNotConfigured {
            remediation: GATEWAY_REMEDIATION.to_string(),
        });
    }

    let enable = runner.run(
        "docker",
        &args(&["mcp", "server", "enable", &plan.name]),
        &[],
    )?;
    if !enable.success {
        return Err(Error::Subprocess {
            program: "docker".to_string(),
            stderr: enable.stderr,
        });
    }
    Ok(InstallOutcome::Installed)
}

fn execute_claude(
    plan: &InstallPlan,
    endpoint: &ServerEndpoint,
    runner: &dyn ProcessRunner,
) -> Result<InstallOutcome> {
    let argv = claude_add_args(&plan.name, plan.scope, endpoint);
    let out = runner.run("claude", &argv, &plan.env_exports)?;
    if !out.success {
        return Err(Error::Subprocess {
            program: "claude".to_string(),
            stderr: out.stderr,
        });
    }
    Ok(InstallOutcome::Installed)
}

/// Argument vector for `claude mcp add`.
///
/// stdio:   `mcp add --scope <s> [--env K=V]... <name> -- <command> <args>...`
/// network: `mcp add --scope <s> --transport <t> [--header "K: V"]... <name> <url>`
pub fn claude_add_args(name: &str, scope: Scope, endpoint: &ServerEndpoint) -> Vec<String> {
    let mut argv = args(&["mcp", "add", "--scope", &scope.to_string()]);

    match endpoint {
        ServerEndpoint::Stdio { command, args: cmd_args, env } => {
            for (k, v) in env {
                argv.push("--env".to_string());
                argv.push(format!("{k}={v}"));
            }
            argv.push(name.to_string());
            argv.push("--".to_string());
            argv.push(command.clone());
            argv.extend(cmd_args.iter().cloned());
        }
        ServerEndpoint::Sse { url, headers } | ServerEndpoint::Http { url, headers } => {
            argv.push("--transport".to_string());
            argv.push(endpoint.transport_name().to_string());
            for (k, v) in headers {
                argv.push("--header".to_string());
                argv.push(format!("{k}: {v}"));
            }
            argv.push(name.to_string());
            argv.push(url.clone());
        }
    }
    argv
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::fake::FakeRunner;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn plan(action: PlanAction) -> InstallPlan {
        InstallPlan {
            name: "srv".to_string(),
            scope: Scope::Local,
            action,
            rendered: json!({}),
            env_exports: vec![],
        }
    }

    #[test]
    fn sse_argv_matches_the_claude_cli_contract() {
        let endpoint = ServerEndpoint::Sse {
            url: "https://x/sse".to_string(),
            headers: BTreeMap::from([("Authorization".to_string(), "Bearer t".to_string())]),
        };
        let argv = claude_add_args("api", Scope::Local, &endpoint);
        assert_eq!(
            argv,
            vec![
                "mcp",
                "add",
                "--scope",
                "local",
                "--transport",
                "sse",
                "--header",
                "Authorization: Bearer t",
                "api",
                "https://x/sse",
            ]
        );
    }

    #[test]
    fn stdio_argv_puts_command_after_double_dash() {
        let endpoint = ServerEndpoint::Stdio {
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "server-redis".to_string()],
            env: BTreeMap::from([("REDIS_URL".to_string(), "redis://localhost".to_string())]),
        };
        let argv = claude_add_args("redis", Scope::Project, &endpoint);
        assert_eq!(
            argv,
            vec![
                "mcp",
                "add",
                "--scope",
                "project",
                "--env",
                "REDIS_URL=redis://localhost",
                "redis",
                "--",
                "npx",
                "-y",
                "server-redis",
            ]
        );
    }

    #[test]
    fn missing_gateway_yields_remediation_not_an_error() {
        let runner = FakeRunner::new().respond(
            "docker mcp gateway status",
            FakeRunner::fail_with_stderr("no gateway"),
        );
        let outcome = execute(&plan(PlanAction::DockerGateway), &runner).unwrap();
        assert!(matches!(
            outcome,
            InstallOutcome::GatewayNotConfigured { remediation } if remediation.contains("gateway")
        ));
        // The enable step must not have been attempted.
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn configured_gateway_enables_the_server_by_name() {
        let runner = FakeRunner::new();
        let outcome = execute(&plan(PlanAction::DockerGateway), &runner).unwrap();
        assert_eq!(outcome, InstallOutcome::Installed);
        assert_eq!(
            runner.argv_lines(),
            vec![
                "docker mcp gateway status",
                "docker mcp server enable srv",
            ]
        );
    }

    #[test]
    fn failed_claude_invocation_carries_stderr() {
        let runner = FakeRunner::new()
            .respond("claude mcp add", FakeRunner::fail_with_stderr("boom"));
        let endpoint = ServerEndpoint::Stdio {
            command: "npx".to_string(),
            args: vec![],
            env: BTreeMap::new(),
        };
        let err = execute(&plan(PlanAction::ClaudeCli { endpoint }), &runner).unwrap_err();
        assert!(matches!(
            err,
            Error::Subprocess { program, stderr } if program == "claude" && stderr == "boom"
        ));
    }

    #[test]
    fn env_exports_reach_the_subprocess_environment() {
        let runner = FakeRunner::new();
        let endpoint = ServerEndpoint::Stdio {
            command: "npx".to_string(),
            args: vec![],
            env: BTreeMap::new(),
        };
        let mut p = plan(PlanAction::ClaudeCli { endpoint });
        p.env_exports = vec![("API_KEY".to_string(), "secret".to_string())];
        execute(&p, &runner).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].2, vec![("API_KEY".to_string(), "secret".to_string())]);
    }

    #[test]
    fn manual_provider_runs_nothing() {
        let runner = FakeRunner::new();
        let outcome = execute(
            &plan(PlanAction::Manual {
                steps: vec!["download the binary".to_string()],
            }),
            &runner,
        )
        .unwrap();
        assert_eq!(
            outcome,
            InstallOutcome::ManualSteps(vec!["download the binary".to_string()])
        );
        assert!(runner.calls.borrow().is_empty());
    }
}
