//! Registry client: fetch the registry document and look up descriptors.
//!
//! A plain fetch plus schema validation; one attempt per request, no
//! retries.

use std::time::Duration;

use tracing::debug;

use crate::errors::{Error, Result};
use crate::models::{FileItemDescriptor, McpServerDescriptor, RegistryDocument};

fn build_http_client() -> std::result::Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("bwc/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(30))
        .build()
}

/// One fetched registry document with typed lookups.
#[derive(Debug, Default)]
pub struct Registry {
    doc: RegistryDocument,
}

impl Registry {
    /// Fetch and deserialize the registry from `url`.
    pub fn fetch(url: &str) -> Result<Self> {
        debug!(url, "fetching registry");
        let client = build_http_client()?;
        let resp = client.get(url).send()?.error_for_status()?;
        let doc: RegistryDocument = resp.json()?;
        Ok(Self { doc })
    }

    /// Wrap an already-parsed document (tests, cached fetches).
    pub fn from_document(doc: RegistryDocument) -> Self {
        Self { doc }
    }

    pub fn mcp_servers(&self) -> &[McpServerDescriptor] {
        &self.doc.mcp_servers
    }

    pub fn subagents(&self) -> &[FileItemDescriptor] {
        &self.doc.subagents
    }

    pub fn commands(&self) -> &[FileItemDescriptor] {
        &self.doc.commands
    }

    pub fn find_mcp_server(&self, name: &str) -> Result<&McpServerDescriptor> {
        self.doc
            .mcp_servers
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::DescriptorNotFound {
                kind: "MCP server",
                name: name.to_string(),
            })
    }

    pub fn find_subagent(&self, name: &str) -> Result<&FileItemDescriptor> {
        self.doc
            .subagents
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::DescriptorNotFound {
                kind: "Subagent",
                name: name.to_string(),
            })
    }

    pub fn find_command(&self, name: &str) -> Result<&FileItemDescriptor> {
        self.doc
            .commands
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::DescriptorNotFound {
                kind: "Command",
                name: name.to_string(),
            })
    }

    /// Case-insensitive substring search across all three item kinds.
    /// Returns `(kind, name, description)` rows for display.
    pub fn search(&self, query: &str) -> Vec<(&'static str, String, String)> {
        let q = query.to_lowercase();
        let matches = |name: &str, desc: Option<&str>| {
            name.to_lowercase().contains(&q)
                || desc.map(|d| d.to_lowercase().contains(&q)).unwrap_or(false)
        };

        let mut rows = Vec::new();
        for s in &self.doc.subagents {
            if matches(&s.name, s.description.as_deref()) {
                rows.push(("subagent", s.name.clone(), s.description.clone().unwrap_or_default()));
            }
        }
        for c in &self.doc.commands {
            if matches(&c.name, c.description.as_deref()) {
                rows.push(("command", c.name.clone(), c.description.clone().unwrap_or_default()));
            }
        }
        for m in &self.doc.mcp_servers {
            if matches(&m.name, m.description.as_deref()) {
                rows.push((
                    "mcp-server",
                    m.name.clone(),
                    m.description.clone().unwrap_or_default(),
                ));
            }
        }
        rows
    }
}
