//! bwc - subagent, command, and MCP server installer
//!
//! Resolves which config scope is active, picks an installation provider,
//! validates user inputs, executes the install, and records the result.

pub mod config;
pub mod errors;
pub mod executor;
pub mod inputs;
pub mod install;
pub mod migrate;
pub mod models;
pub mod paths;
pub mod provider;
pub mod registry;
pub mod runner;
pub mod shared;
pub mod verify;

pub use config::{ConfigScope, ConfigStore, ScopeOverride};
pub use errors::{Error, Result};
pub use executor::{claude_add_args, execute, InstallOutcome, InstallPlan, PlanAction};
pub use install::{
    install_declared, install_file_item, install_server, remove_file_item, remove_server,
    InstallOptions, InstallSummary, ItemKind, ServerInstallReport,
};
pub use models::{Config, McpServerConfig, Provider, Scope, ServerEndpoint};
pub use provider::{select_method, Hints, SelectedMethod};
pub use registry::Registry;
pub use runner::{ProcessRunner, RunOutput, SystemRunner};
pub use shared::SharedManifest;
pub use verify::{verify, VerificationResult, VerificationStatus};
