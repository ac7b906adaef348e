//! Install and remove subagents, commands, and MCP servers.
//!
//! Ties the selector, input pipeline, and executor together, then records
//! the result in the manifest (and in `.mcp.json` for project scope).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{ConfigScope, ConfigStore};
use crate::errors::{Error, Result};
use crate::executor::{execute, InstallOutcome, InstallPlan, PlanAction};
use crate::inputs;
use crate::models::{
    InstallationMethod, McpServerConfig, McpServerDescriptor, MethodKind, NetworkTransport,
    Provider, Scope, ServerEndpoint,
};
use crate::provider::{select_method, Hints, SelectedMethod};
use crate::registry::Registry;
use crate::runner::ProcessRunner;
use crate::shared::SharedManifest;

/// Options for one server install, translated from CLI flags.
#[derive(Debug, Default)]
pub struct InstallOptions {
    pub scope: Option<Scope>,
    pub hints: Hints,
    /// `--set name=value` user-input values.
    pub inputs: BTreeMap<String, String>,
    /// `--header "K: V"` pairs for direct network installs.
    pub headers: Vec<(String, String)>,
    /// Re-run the provider action even when the server is already recorded.
    pub force: bool,
}

/// What happened for one server.
#[derive(Debug, PartialEq)]
pub enum ServerInstallReport {
    Installed { warnings: Vec<String> },
    AlreadyInstalled,
    ManualSteps(Vec<String>),
    GatewayNotConfigured { remediation: String },
}

/// Install one MCP server by name.
///
/// Ordering on success: provider action, then the project shared-manifest
/// merge, then the config record, then any security warning. The
/// already-recorded check up front keeps re-runs after partial failures
/// from repeating the provider action.
pub fn install_server(
    store: &mut ConfigStore,
    registry: &Registry,
    name: &str,
    opts: &InstallOptions,
    runner: &dyn ProcessRunner,
) -> Result<ServerInstallReport> {
    if !opts.force && store.mcp_server(name).is_some() {
        debug!(name, "server already recorded; skipping provider action");
        return Ok(ServerInstallReport::AlreadyInstalled);
    }

    let descriptor = registry.find_mcp_server(name)?;
    let scope = opts.scope.unwrap_or_else(|| store.default_install_scope());
    // Project scope writes `.mcp.json` next to the project manifest; with
    // only the user config active there is no project root to write into.
    if scope == Scope::Project && store.scope() != ConfigScope::Project {
        return Err(Error::Validation(vec![
            "scope: project scope requires a project config (bwc.json); only the user config is active"
                .to_string(),
        ]));
    }
    let selected = select_method(descriptor, &opts.hints)?;

    let values = inputs::collect(descriptor, &opts.inputs);
    inputs::validate(&values, descriptor)?;
    let ops = inputs::plan_ops(descriptor, &values);

    let plan = build_plan(name, scope, descriptor, &selected, &ops, &opts.headers)?;
    let provider = match plan.action {
        PlanAction::DockerGateway => Provider::Docker,
        PlanAction::ClaudeCli { .. } | PlanAction::Manual { .. } => Provider::Claude,
    };

    match execute(&plan, runner)? {
        InstallOutcome::GatewayNotConfigured { remediation } => {
            return Ok(ServerInstallReport::GatewayNotConfigured { remediation });
        }
        InstallOutcome::ManualSteps(steps) => {
            return Ok(ServerInstallReport::ManualSteps(steps));
        }
        InstallOutcome::Installed => {}
    }

    if scope == Scope::Project {
        SharedManifest::at_project_root(store.project_root()).merge_server(
            name,
            &plan.rendered,
            &plan.env_exports,
        )?;
    }

    store.add_mcp_server(
        name,
        McpServerConfig {
            provider,
            scope,
            endpoint: endpoint_for_record(&plan),
            verification_status: None,
            installed_at: chrono::Utc::now(),
        },
    );
    store.save()?;

    let mut warnings = Vec::new();
    if descriptor.experimental {
        warnings.push(format!(
            "'{name}' is experimental; review its permissions before use."
        ));
    }
    if let Some(note) = &descriptor.security_note {
        warnings.push(note.clone());
    }
    Ok(ServerInstallReport::Installed { warnings })
}

/// Re-run the provider action for a server already recorded in the
/// manifest, without consulting the registry. Used by bulk install so a
/// freshly cloned project converges on its declared state.
pub fn reinstall_recorded(
    name: &str,
    cfg: &McpServerConfig,
    runner: &dyn ProcessRunner,
) -> Result<ServerInstallReport> {
    let action = match cfg.provider {
        Provider::Docker => PlanAction::DockerGateway,
        Provider::Claude => PlanAction::ClaudeCli {
            endpoint: cfg.endpoint.clone(),
        },
    };
    let plan = InstallPlan {
        name: name.to_string(),
        scope: cfg.scope,
        action,
        rendered: serde_json::to_value(&cfg.endpoint)?,
        env_exports: vec![],
    };
    match execute(&plan, runner)? {
        InstallOutcome::GatewayNotConfigured { remediation } => {
            Ok(ServerInstallReport::GatewayNotConfigured { remediation })
        }
        InstallOutcome::ManualSteps(steps) => Ok(ServerInstallReport::ManualSteps(steps)),
        InstallOutcome::Installed => Ok(ServerInstallReport::Installed { warnings: vec![] }),
    }
}

fn build_plan(
    name: &str,
    scope: Scope,
    descriptor: &McpServerDescriptor,
    selected: &SelectedMethod<'_>,
    ops: &[inputs::TemplateOp],
    headers: &[(String, String)],
) -> Result<InstallPlan> {
    match selected {
        SelectedMethod::DirectNetwork { transport, url } => {
            let endpoint = network_endpoint(*transport, url, headers);
            let rendered = serde_json::to_value(&endpoint)?;
            Ok(InstallPlan {
                name: name.to_string(),
                scope,
                action: PlanAction::ClaudeCli { endpoint },
                rendered,
                env_exports: vec![],
            })
        }
        SelectedMethod::Declared(method) => {
            let method: &InstallationMethod = method;
            let mut rendered = template_for(method, name);
            let env_exports = inputs::apply_ops(&mut rendered, ops);

            let action = match method.kind {
                MethodKind::Docker => PlanAction::DockerGateway,
                MethodKind::Manual => PlanAction::Manual {
                    steps: method.steps.clone(),
                },
                MethodKind::Npm | MethodKind::Binary | MethodKind::Bwc | MethodKind::ClaudeCli => {
                    PlanAction::ClaudeCli {
                        endpoint: endpoint_from_rendered(&rendered)
                            .ok_or_else(|| Error::NoInstallationMethod(descriptor.name.clone()))?,
                    }
                }
            };

            Ok(InstallPlan {
                name: name.to_string(),
                scope,
                action,
                rendered,
                env_exports,
            })
        }
    }
}

/// Starting template for a declared method: its `config_example` when it
/// parses, else a minimal spec derived from the command template.
fn template_for(method: &InstallationMethod, name: &str) -> Value {
    if let Some(example) = &method.config_example {
        match serde_json::from_str::<Value>(example) {
            Ok(v) if v.is_object() => return v,
            Ok(_) => warn!(name, "config_example is not a JSON object; falling back"),
            Err(e) => warn!(name, error = %e, "unparseable config_example; falling back"),
        }
    }
    if let Some(command) = &method.command {
        let mut parts = command.split_whitespace();
        if let Some(program) = parts.next() {
            return json!({
                "command": program,
                "args": parts.collect::<Vec<_>>(),
                "env": {},
            });
        }
    }
    json!({ "command": "", "args": [], "env": {} })
}

fn network_endpoint(
    transport: NetworkTransport,
    url: &str,
    headers: &[(String, String)],
) -> ServerEndpoint {
    let headers: BTreeMap<String, String> = headers.iter().cloned().collect();
    match transport {
        NetworkTransport::Sse => ServerEndpoint::Sse {
            url: url.to_string(),
            headers,
        },
        NetworkTransport::Http => ServerEndpoint::Http {
            url: url.to_string(),
            headers,
        },
    }
}

/// Interpret a rendered template as a connection endpoint. Tagged specs
/// deserialize directly; untagged ones fall back on shape detection.
fn endpoint_from_rendered(rendered: &Value) -> Option<ServerEndpoint> {
    if let Ok(ep) = serde_json::from_value::<ServerEndpoint>(rendered.clone()) {
        return Some(ep);
    }

    if let Some(url) = rendered.get("url").and_then(Value::as_str) {
        let headers = string_map(rendered.get("headers"));
        let transport = rendered.get("transport").and_then(Value::as_str);
        return Some(match transport {
            Some("sse") => ServerEndpoint::Sse {
                url: url.to_string(),
                headers,
            },
            _ => ServerEndpoint::Http {
                url: url.to_string(),
                headers,
            },
        });
    }

    let command = rendered.get("command").and_then(Value::as_str)?;
    let args = rendered
        .get("args")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(ServerEndpoint::Stdio {
        command: command.to_string(),
        args,
        env: string_map(rendered.get("env")),
    })
}

fn string_map(v: Option<&Value>) -> BTreeMap<String, String> {
    v.and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Record endpoint for the manifest. Docker servers are addressed by name
/// through the gateway, so their stdio record stays empty.
fn endpoint_for_record(plan: &InstallPlan) -> ServerEndpoint {
    match &plan.action {
        PlanAction::ClaudeCli { endpoint } => endpoint.clone(),
        PlanAction::DockerGateway | PlanAction::Manual { .. } => {
            endpoint_from_rendered(&plan.rendered).unwrap_or(ServerEndpoint::Stdio {
                command: String::new(),
                args: vec![],
                env: BTreeMap::new(),
            })
        }
    }
}

/// Remove one server: config record plus, for project scope, the shared
/// manifest entry. Returns whether anything was recorded at all.
pub fn remove_server(store: &mut ConfigStore, name: &str) -> Result<bool> {
    let Some(cfg) = store.remove_mcp_server(name) else {
        return Ok(false);
    };
    if cfg.scope == Scope::Project {
        let removed = SharedManifest::at_project_root(store.project_root()).remove_server(name)?;
        if !removed {
            debug!(name, "no shared manifest entry to remove");
        }
    }
    store.save()?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// File items (subagents, commands)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Subagent,
    Command,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Subagent => f.write_str("subagent"),
            ItemKind::Command => f.write_str("command"),
        }
    }
}

/// Fetch a subagent or command body from the registry and write it into
/// the configured install directory.
pub fn install_file_item(
    store: &mut ConfigStore,
    registry: &Registry,
    kind: ItemKind,
    name: &str,
) -> Result<PathBuf> {
    let (descriptor, dir) = match kind {
        ItemKind::Subagent => (registry.find_subagent(name)?, store.subagents_dir()),
        ItemKind::Command => (registry.find_command(name)?, store.commands_dir()),
    };

    std::fs::create_dir_all(&dir).map_err(|source| Error::WriteFile {
        path: dir.clone(),
        source,
    })?;
    let path = dir.join(format!("{name}.md"));
    let body = descriptor.content.clone().unwrap_or_default();
    std::fs::write(&path, body).map_err(|source| Error::WriteFile {
        path: path.clone(),
        source,
    })?;

    match kind {
        ItemKind::Subagent => store.add_installed_subagent(name),
        ItemKind::Command => store.add_installed_command(name),
    }
    store.save()?;
    Ok(path)
}

/// Delete a file item and its manifest record. Returns whether it was
/// recorded.
pub fn remove_file_item(store: &mut ConfigStore, kind: ItemKind, name: &str) -> Result<bool> {
    let recorded = match kind {
        ItemKind::Subagent => store.remove_installed_subagent(name),
        ItemKind::Command => store.remove_installed_command(name),
    };
    if !recorded {
        return Ok(false);
    }

    let dir = match kind {
        ItemKind::Subagent => store.subagents_dir(),
        ItemKind::Command => store.commands_dir(),
    };
    let path = dir.join(format!("{name}.md"));
    if path.is_file() {
        std::fs::remove_file(&path).map_err(|source| Error::WriteFile { path, source })?;
    }
    store.save()?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Bulk install
// ---------------------------------------------------------------------------

/// Aggregate result of a bulk operation.
#[derive(Debug, Default)]
pub struct InstallSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<(String, String)>,
}

impl InstallSummary {
    fn record<T>(&mut self, name: &str, result: Result<T>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(e) => {
                warn!(name, error = %e, "item failed; continuing");
                self.failed += 1;
                self.failures.push((name.to_string(), e.to_string()));
            }
        }
    }
}

/// Materialize everything the manifest declares: file items from the
/// registry, provider actions for every recorded server. Items are
/// processed sequentially and failures are isolated per item.
pub fn install_declared(
    store: &mut ConfigStore,
    registry: &Registry,
    runner: &dyn ProcessRunner,
) -> InstallSummary {
    let mut summary = InstallSummary::default();

    let subagents: Vec<String> = store.config().installed.subagents.iter().cloned().collect();
    for name in subagents {
        let result = install_file_item(store, registry, ItemKind::Subagent, &name);
        summary.record(&name, result);
    }

    let commands: Vec<String> = store.config().installed.commands.iter().cloned().collect();
    for name in commands {
        let result = install_file_item(store, registry, ItemKind::Command, &name);
        summary.record(&name, result);
    }

    let servers: Vec<(String, McpServerConfig)> = store
        .config()
        .installed
        .mcp_servers
        .iter()
        .map(|(n, c)| (n.clone(), c.clone()))
        .collect();
    for (name, cfg) in servers {
        let result = reinstall_recorded(&name, &cfg, runner);
        summary.record(&name, result);
    }

    summary
}
