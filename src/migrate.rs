//! Legacy manifest migration.
//!
//! Early manifests stored `installed.mcpServers` as a bare array of names.
//! Migration rewrites that into the map shape on load, working on raw JSON
//! so unknown fields elsewhere in the file survive untouched.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

/// Rewrite `installed.mcpServers` into the map-of-records shape, in place.
///
/// Already-migrated configs pass through unchanged. A malformed entry inside
/// the map (anything that is not an object) is normalized to a best-effort
/// record rather than failing the load.
pub fn migrate_raw(root: &mut Value) {
    let Some(servers) = root
        .get_mut("installed")
        .and_then(|i| i.get_mut("mcpServers"))
    else {
        return;
    };

    match servers {
        Value::Array(names) => {
            let mut map = serde_json::Map::new();
            for entry in names.iter() {
                match entry.as_str() {
                    Some(name) => {
                        map.insert(name.to_string(), legacy_record());
                    }
                    None => {
                        warn!(?entry, "skipping unusable legacy mcpServers entry");
                    }
                }
            }
            *servers = Value::Object(map);
        }
        Value::Object(map) => {
            for (name, entry) in map.iter_mut() {
                if !entry.is_object() {
                    warn!(%name, "normalizing malformed mcpServers entry");
                    *entry = legacy_record();
                }
            }
        }
        _ => {
            warn!("mcpServers is neither an array nor a map; resetting to empty");
            *servers = json!({});
        }
    }
}

/// Best-effort record for a name-only legacy entry. Legacy installs were
/// docker-gateway servers addressed by name, so the stdio command is empty.
fn legacy_record() -> Value {
    json!({
        "provider": "docker",
        "scope": "local",
        "transport": "stdio",
        "command": "",
        "args": [],
        "env": {},
        "installedAt": Utc::now().to_rfc3339(),
    })
}
