//! Project-shared `.mcp.json` manifest.
//!
//! Project-scope installs merge their connection spec here so the whole
//! team picks the server up from version control.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::errors::{Error, Result};
use crate::paths::SHARED_MANIFEST;

#[derive(Debug)]
pub struct SharedManifest {
    path: PathBuf,
}

impl SharedManifest {
    pub fn at_project_root(root: &Path) -> Self {
        Self {
            path: root.join(SHARED_MANIFEST),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge one server's rendered spec into the manifest, creating the
    /// file if needed. Env overrides land in interpolation-safe form.
    pub fn merge_server(
        &self,
        name: &str,
        rendered: &Value,
        env_overrides: &[(String, String)],
    ) -> Result<()> {
        let mut manifest = self.read_or_default()?;
        let mut spec = extract_spec(name, rendered);
        if !spec.is_object() {
            spec = Value::Object(serde_json::Map::new());
        }

        for (key, value) in env_overrides {
            if !spec.get("env").map(Value::is_object).unwrap_or(false) {
                spec["env"] = json!({});
            }
            let env = spec["env"].as_object_mut().unwrap();
            // Values already containing `$` are treated as interpolated.
            let written = if value.contains('$') {
                value.clone()
            } else {
                format!("${{{key}:-{value}}}")
            };
            env.insert(key.clone(), Value::String(written));
        }

        manifest["mcpServers"][name] = spec;
        self.write(&manifest)
    }

    /// Remove one server entry. Returns whether anything was removed, so
    /// callers can tell "was absent" from "removed".
    pub fn remove_server(&self, name: &str) -> Result<bool> {
        if !self.path.is_file() {
            return Ok(false);
        }
        let mut manifest = self.read_or_default()?;
        let removed = manifest
            .get_mut("mcpServers")
            .and_then(Value::as_object_mut)
            .and_then(|m| m.remove(name))
            .is_some();
        if removed {
            self.write(&manifest)?;
        }
        Ok(removed)
    }

    /// Server names currently present, for verification and listing.
    pub fn server_names(&self) -> Result<Vec<String>> {
        let manifest = self.read_or_default()?;
        Ok(manifest
            .get("mcpServers")
            .and_then(Value::as_object)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn read_or_default(&self) -> Result<Value> {
        if !self.path.is_file() {
            return Ok(json!({ "mcpServers": {} }));
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| Error::ReadFile {
            path: self.path.clone(),
            source,
        })?;
        let mut manifest: Value =
            serde_json::from_str(&content).map_err(|source| Error::ParseFile {
                path: self.path.clone(),
                source,
            })?;
        // Valid JSON but not an object (say, an array) cannot hold entries.
        if !manifest.is_object() {
            return Ok(json!({ "mcpServers": {} }));
        }
        if !manifest.get("mcpServers").map(Value::is_object).unwrap_or(false) {
            manifest["mcpServers"] = json!({});
        }
        Ok(manifest)
    }

    fn write(&self, manifest: &Value) -> Result<()> {
        let output = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&self.path, output).map_err(|source| Error::WriteFile {
            path: self.path.clone(),
            source,
        })
    }
}

/// Pull the single server's spec out of the rendered template. Templates
/// arrive either as the bare spec or wrapped in `{mcpServers: {name: spec}}`.
fn extract_spec(name: &str, rendered: &Value) -> Value {
    if let Some(servers) = rendered.get("mcpServers").and_then(Value::as_object) {
        if let Some(spec) = servers.get(name) {
            return spec.clone();
        }
        if servers.len() == 1 {
            return servers.values().next().unwrap().clone();
        }
    }
    rendered.clone()
}
