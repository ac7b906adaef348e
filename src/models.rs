//! Data structures for the manifest and registry documents.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Visibility tier of an installed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Local,
    User,
    Project,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Local => "local",
            Scope::User => "user",
            Scope::Project => "project",
        };
        f.write_str(s)
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "local" => Ok(Scope::Local),
            "user" => Ok(Scope::User),
            "project" => Ok(Scope::Project),
            other => Err(Error::InvalidScope(other.to_string())),
        }
    }
}

/// Mechanism that actually installed an MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Docker,
    Claude,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Docker => f.write_str("docker"),
            Provider::Claude => f.write_str("claude"),
        }
    }
}

/// Network transport for remote servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkTransport {
    Sse,
    Http,
}

impl fmt::Display for NetworkTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkTransport::Sse => f.write_str("sse"),
            NetworkTransport::Http => f.write_str("http"),
        }
    }
}

impl FromStr for NetworkTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "sse" => Ok(NetworkTransport::Sse),
            "http" => Ok(NetworkTransport::Http),
            other => Err(format!("unknown transport '{other}' (expected sse or http)")),
        }
    }
}

/// Connection shape of an installed server. The `transport` tag guarantees
/// exactly one payload shape per record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum ServerEndpoint {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    Sse {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
    Http {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl ServerEndpoint {
    pub fn transport_name(&self) -> &'static str {
        match self {
            ServerEndpoint::Stdio { .. } => "stdio",
            ServerEndpoint::Sse { .. } => "sse",
            ServerEndpoint::Http { .. } => "http",
        }
    }

    pub fn network_transport(&self) -> Option<NetworkTransport> {
        match self {
            ServerEndpoint::Stdio { .. } => None,
            ServerEndpoint::Sse { .. } => Some(NetworkTransport::Sse),
            ServerEndpoint::Http { .. } => Some(NetworkTransport::Http),
        }
    }
}

/// Record of one installed MCP server in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    pub provider: Provider,
    pub scope: Scope,
    #[serde(flatten)]
    pub endpoint: ServerEndpoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<String>,
    pub installed_at: DateTime<Utc>,
}

/// Install directories for file-based items, relative to the project root
/// unless absolute or `~`-prefixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallPaths {
    pub subagents: String,
    pub commands: String,
}

impl Default for InstallPaths {
    fn default() -> Self {
        Self {
            subagents: ".claude/agents".to_string(),
            commands: ".claude/commands".to_string(),
        }
    }
}

/// Everything currently installed through this manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installed {
    #[serde(default)]
    pub subagents: BTreeSet<String>,
    #[serde(default)]
    pub commands: BTreeSet<String>,
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, McpServerConfig>,
}

/// Root manifest (`bwc.json` or the user-scope config file).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    pub registry: String,
    #[serde(default)]
    pub paths: InstallPaths,
    #[serde(default)]
    pub installed: Installed,
}

pub const CONFIG_VERSION: &str = "1.0";
pub const DEFAULT_REGISTRY: &str = "https://buildwithclaude.com/registry.json";

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            registry: DEFAULT_REGISTRY.to_string(),
            paths: InstallPaths::default(),
            installed: Installed::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry descriptors (read-only input)
// ---------------------------------------------------------------------------

/// Registry document: `{subagents: [], commands: [], mcpServers: []}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryDocument {
    #[serde(default)]
    pub subagents: Vec<FileItemDescriptor>,
    #[serde(default)]
    pub commands: Vec<FileItemDescriptor>,
    #[serde(default)]
    pub mcp_servers: Vec<McpServerDescriptor>,
}

/// A subagent or command: a named markdown file plus display metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct FileItemDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Markdown body, inlined by the registry.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct McpServerDescriptor {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub experimental: bool,
    #[serde(default)]
    pub security_note: Option<String>,
    #[serde(default)]
    pub installation_methods: Vec<InstallationMethod>,
    #[serde(default)]
    pub user_inputs: Vec<UserInput>,
}

impl McpServerDescriptor {
    pub fn title(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationMethod {
    #[serde(rename = "type")]
    pub kind: MethodKind,
    #[serde(default)]
    pub recommended: bool,
    /// Command template, e.g. `docker mcp server enable redis`.
    #[serde(default)]
    pub command: Option<String>,
    /// JSON string holding the connection-spec template for this method.
    #[serde(default)]
    pub config_example: Option<String>,
    /// Documented steps for manual installation.
    #[serde(default)]
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodKind {
    Docker,
    Npm,
    Manual,
    Binary,
    Bwc,
    ClaudeCli,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MethodKind::Docker => "docker",
            MethodKind::Npm => "npm",
            MethodKind::Manual => "manual",
            MethodKind::Binary => "binary",
            MethodKind::Bwc => "bwc",
            MethodKind::ClaudeCli => "claude-cli",
        };
        f.write_str(s)
    }
}

impl FromStr for MethodKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "docker" => Ok(MethodKind::Docker),
            "npm" => Ok(MethodKind::Npm),
            "manual" => Ok(MethodKind::Manual),
            "binary" => Ok(MethodKind::Binary),
            "bwc" => Ok(MethodKind::Bwc),
            "claude-cli" => Ok(MethodKind::ClaudeCli),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// A parameter the server needs from the user before installation.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub name: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub validation: Option<InputValidation>,
    /// Export the value as this process environment variable.
    #[serde(default)]
    pub env_var: Option<String>,
    /// Dotted JSON path into the config template, e.g. `env.API_KEY`.
    #[serde(default)]
    pub config_path: Option<String>,
    /// Insert the value into the template's args array at this index.
    #[serde(default)]
    pub arg_position: Option<usize>,
    /// Allowed values for `select` inputs.
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Path,
    String,
    Boolean,
    Number,
    Url,
    Select,
    Password,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputValidation {
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_length: Option<usize>,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub must_exist: bool,
    #[serde(default)]
    pub must_be_dir: bool,
    #[serde(default)]
    pub must_be_file: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_rejects_unknown_values() {
        assert!(matches!(
            "global".parse::<Scope>(),
            Err(Error::InvalidScope(s)) if s == "global"
        ));
    }

    #[test]
    fn endpoint_tag_matches_payload_shape() {
        let json = r#"{"provider":"claude","scope":"user","transport":"sse",
            "url":"https://x/sse","headers":{},"installedAt":"2025-01-01T00:00:00Z"}"#;
        let cfg: McpServerConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(cfg.endpoint, ServerEndpoint::Sse { ref url, .. } if url == "https://x/sse"));
        assert_eq!(cfg.endpoint.network_transport(), Some(NetworkTransport::Sse));
    }

    #[test]
    fn registry_method_kinds_parse_kebab_case() {
        let json = r#"{"type":"claude-cli","recommended":true}"#;
        let m: InstallationMethod = serde_json::from_str(json).unwrap();
        assert_eq!(m.kind, MethodKind::ClaudeCli);
    }
}
