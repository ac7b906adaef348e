//! Manifest discovery, load, and save.
//!
//! A `ConfigStore` is constructed once per command invocation and passed
//! down; nothing caches config state across operations.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::migrate::migrate_raw;
use crate::models::{Config, McpServerConfig, Scope};
use crate::paths;

/// Which manifest file is active for this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Project,
    User,
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigScope::Project => f.write_str("project"),
            ConfigScope::User => f.write_str("user"),
        }
    }
}

/// Caller preference for which manifest to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeOverride {
    /// Project manifest if one is found, else the user manifest.
    #[default]
    Auto,
    ForceUser,
    ForceProject,
}

/// Handle on the active manifest: its file, its root directory, and the
/// loaded config.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    root: PathBuf,
    scope: ConfigScope,
    config: Config,
}

impl ConfigStore {
    /// Locate and load the active manifest starting from `cwd`.
    ///
    /// The project manifest is searched for in `cwd` and every ancestor;
    /// the user manifest lives at a fixed home path. When both exist the
    /// project one wins unless `ScopeOverride` says otherwise.
    pub fn discover(cwd: &Path, preference: ScopeOverride) -> Result<Self> {
        Self::discover_at(cwd, &paths::user_config_path(), preference)
    }

    pub(crate) fn discover_at(
        cwd: &Path,
        user_path: &Path,
        preference: ScopeOverride,
    ) -> Result<Self> {
        let project = find_project_manifest(cwd);
        let user = user_path.is_file().then(|| user_path.to_path_buf());

        let (path, scope) = match preference {
            ScopeOverride::ForceProject => (project.ok_or(Error::ConfigNotFound)?, ConfigScope::Project),
            ScopeOverride::ForceUser => (user.ok_or(Error::ConfigNotFound)?, ConfigScope::User),
            ScopeOverride::Auto => match (project, user) {
                (Some(p), _) => (p, ConfigScope::Project),
                (None, Some(u)) => (u, ConfigScope::User),
                (None, None) => return Err(Error::ConfigNotFound),
            },
        };

        debug!(path = %path.display(), %scope, "loading manifest");
        let config = load_file(&path)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self { path, root, scope, config })
    }

    /// Create a fresh manifest with defaults. Loads the existing file
    /// instead if one is already there.
    pub fn init(dir: &Path, scope: ConfigScope) -> Result<Self> {
        let path = match scope {
            ConfigScope::Project => dir.join(paths::PROJECT_MANIFEST),
            ConfigScope::User => paths::user_config_path(),
        };
        if path.is_file() {
            let config = load_file(&path)?;
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            return Ok(Self { path, root, scope, config });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::WriteFile {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let store = Self {
            path,
            root,
            scope,
            config: Config::default(),
        };
        store.save()?;
        Ok(store)
    }

    /// Serialize and atomically replace the manifest file.
    pub fn save(&self) -> Result<()> {
        let output = serde_json::to_string_pretty(&self.config)?;
        let tmp = self.path.with_extension(format!("tmp.{}", std::process::id()));
        std::fs::write(&tmp, output).map_err(|source| Error::WriteFile {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| Error::WriteFile {
            path: self.path.clone(),
            source,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scope(&self) -> ConfigScope {
        self.scope
    }

    /// Directory that relative install paths resolve against.
    pub fn project_root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> &Path {
        &self.path
    }

    pub fn registry_url(&self) -> &str {
        &self.config.registry
    }

    pub fn subagents_dir(&self) -> PathBuf {
        paths::resolve_install_path(&self.config.paths.subagents, &self.root)
    }

    pub fn commands_dir(&self) -> PathBuf {
        paths::resolve_install_path(&self.config.paths.commands, &self.root)
    }

    pub fn add_installed_subagent(&mut self, name: &str) {
        self.config.installed.subagents.insert(name.to_string());
    }

    pub fn remove_installed_subagent(&mut self, name: &str) -> bool {
        self.config.installed.subagents.remove(name)
    }

    pub fn add_installed_command(&mut self, name: &str) {
        self.config.installed.commands.insert(name.to_string());
    }

    pub fn remove_installed_command(&mut self, name: &str) -> bool {
        self.config.installed.commands.remove(name)
    }

    pub fn add_mcp_server(&mut self, name: &str, cfg: McpServerConfig) {
        self.config
            .installed
            .mcp_servers
            .insert(name.to_string(), cfg);
    }

    pub fn remove_mcp_server(&mut self, name: &str) -> Option<McpServerConfig> {
        self.config.installed.mcp_servers.remove(name)
    }

    pub fn mcp_server(&self, name: &str) -> Option<&McpServerConfig> {
        self.config.installed.mcp_servers.get(name)
    }

    /// Default install scope for a server when the caller gave none.
    pub fn default_install_scope(&self) -> Scope {
        Scope::Local
    }
}

fn find_project_manifest(cwd: &Path) -> Option<PathBuf> {
    let mut dir = Some(cwd);
    while let Some(d) = dir {
        let candidate = d.join(paths::PROJECT_MANIFEST);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}

/// Read, migrate, and deserialize one manifest file.
fn load_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut raw: Value = serde_json::from_str(&content).map_err(|source| Error::ParseFile {
        path: path.to_path_buf(),
        source,
    })?;
    migrate_raw(&mut raw);
    serde_json::from_value(raw).map_err(|source| Error::ParseFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provider, ServerEndpoint};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn write_manifest(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join(paths::PROJECT_MANIFEST);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn minimal_manifest() -> String {
        serde_json::to_string(&Config::default()).unwrap()
    }

    #[test]
    fn project_manifest_wins_over_user() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        write_manifest(project.path(), &minimal_manifest());
        let user_path = home.path().join("config.json");
        std::fs::write(&user_path, minimal_manifest()).unwrap();

        let store =
            ConfigStore::discover_at(project.path(), &user_path, ScopeOverride::Auto).unwrap();
        assert_eq!(store.scope(), ConfigScope::Project);
        assert_eq!(store.project_root(), project.path());
    }

    #[test]
    fn force_user_overrides_project_precedence() {
        let project = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        write_manifest(project.path(), &minimal_manifest());
        let user_path = home.path().join("config.json");
        std::fs::write(&user_path, minimal_manifest()).unwrap();

        let store =
            ConfigStore::discover_at(project.path(), &user_path, ScopeOverride::ForceUser).unwrap();
        assert_eq!(store.scope(), ConfigScope::User);
    }

    #[test]
    fn user_manifest_is_fallback() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let user_path = home.path().join("config.json");
        std::fs::write(&user_path, minimal_manifest()).unwrap();

        let store = ConfigStore::discover_at(cwd.path(), &user_path, ScopeOverride::Auto).unwrap();
        assert_eq!(store.scope(), ConfigScope::User);
    }

    #[test]
    fn missing_both_manifests_is_config_not_found() {
        let cwd = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        let err = ConfigStore::discover_at(
            cwd.path(),
            &home.path().join("config.json"),
            ScopeOverride::Auto,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound));
    }

    #[test]
    fn manifest_is_found_from_a_nested_directory() {
        let project = tempfile::tempdir().unwrap();
        write_manifest(project.path(), &minimal_manifest());
        let nested = project.path().join("src/deep");
        std::fs::create_dir_all(&nested).unwrap();

        let store = ConfigStore::discover_at(
            &nested,
            Path::new("/nonexistent/config.json"),
            ScopeOverride::Auto,
        )
        .unwrap();
        assert_eq!(store.project_root(), project.path());
        // Relative install paths resolve against the discovered root.
        assert_eq!(
            store.subagents_dir(),
            project.path().join(".claude/agents")
        );
    }

    #[test]
    fn mcp_server_round_trips_through_save_and_reload() {
        let project = tempfile::tempdir().unwrap();
        write_manifest(project.path(), &minimal_manifest());
        let user_path = Path::new("/nonexistent/config.json");

        let mut store =
            ConfigStore::discover_at(project.path(), user_path, ScopeOverride::Auto).unwrap();
        let cfg = McpServerConfig {
            provider: Provider::Claude,
            scope: Scope::Project,
            endpoint: ServerEndpoint::Sse {
                url: "https://x/sse".to_string(),
                headers: BTreeMap::from([("Authorization".to_string(), "Bearer t".to_string())]),
            },
            verification_status: None,
            installed_at: Utc::now(),
        };
        store.add_mcp_server("api", cfg.clone());
        store.save().unwrap();

        let reloaded =
            ConfigStore::discover_at(project.path(), user_path, ScopeOverride::Auto).unwrap();
        assert_eq!(reloaded.mcp_server("api"), Some(&cfg));
    }

    #[test]
    fn legacy_array_manifest_loads_as_migrated_map() {
        let project = tempfile::tempdir().unwrap();
        write_manifest(
            project.path(),
            r#"{
                "version": "1.0",
                "registry": "https://example.com/registry.json",
                "installed": {"subagents": [], "commands": [], "mcpServers": ["redis", "github"]}
            }"#,
        );

        let store = ConfigStore::discover_at(
            project.path(),
            Path::new("/nonexistent/config.json"),
            ScopeOverride::Auto,
        )
        .unwrap();
        let redis = store.mcp_server("redis").unwrap();
        assert_eq!(redis.provider, Provider::Docker);
        assert_eq!(redis.scope, Scope::Local);
        assert!(matches!(redis.endpoint, ServerEndpoint::Stdio { .. }));
        assert!(store.mcp_server("github").is_some());
    }
}
