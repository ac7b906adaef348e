//! Path resolution for project and user scope.
//!
//! Uses `BWC_CONFIG_DIR` when set, otherwise the home-directory default.

use std::path::{Path, PathBuf};

/// Project manifest filename, discovered by walking up from the cwd.
pub const PROJECT_MANIFEST: &str = "bwc.json";

/// Shared manifest filename at the project root (`.mcp.json`).
pub const SHARED_MANIFEST: &str = ".mcp.json";

/// User config directory: `$BWC_CONFIG_DIR` if set, else `~/.bwc`.
pub fn user_config_dir() -> PathBuf {
    if let Ok(val) = std::env::var("BWC_CONFIG_DIR") {
        let trimmed = val.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }
    dirs::home_dir()
        .map(|p| p.join(".bwc"))
        .unwrap_or_else(|| expand_tilde("~/.bwc"))
}

/// User-scope manifest path.
pub fn user_config_path() -> PathBuf {
    user_config_dir().join("config.json")
}

pub fn expand_tilde(path: &str) -> PathBuf {
    let expanded = shellexpand::tilde(path);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a configured install path (`paths.subagents` / `paths.commands`).
///
/// Absolute and `~` paths stand alone; relative paths resolve against the
/// project root of the config file that declared them, not the cwd, so a
/// config discovered in a parent directory still lands in the right place.
pub fn resolve_install_path(configured: &str, project_root: &Path) -> PathBuf {
    let expanded = expand_tilde(configured);
    if expanded.is_absolute() {
        expanded
    } else {
        project_root.join(expanded)
    }
}
