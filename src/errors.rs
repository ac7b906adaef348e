//! Crate-wide error type.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no config found; run 'bwc init' to create one")]
    ConfigNotFound,

    #[error("invalid scope '{0}' (expected local, user, or project)")]
    InvalidScope(String),

    #[error("{kind} '{name}' not found in the registry")]
    DescriptorNotFound { kind: &'static str, name: String },

    #[error("no usable installation method for '{0}'")]
    NoInstallationMethod(String),

    #[error("Invalid input:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    #[error("{program} exited with an error: {stderr}")]
    Subprocess { program: String, stderr: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    ParseFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_violation() {
        let err = Error::Validation(vec![
            "token: must be at least 8 characters".to_string(),
            "port: must be >= 1024".to_string(),
        ]);
        let rendered = err.to_string();
        assert!(rendered.starts_with("Invalid input:"));
        assert!(rendered.contains("token:"));
        assert!(rendered.contains("port:"));
    }

    #[test]
    fn subprocess_message_carries_the_stderr() {
        let err = Error::Subprocess {
            program: "claude".to_string(),
            stderr: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "claude exited with an error: boom");
    }
}
