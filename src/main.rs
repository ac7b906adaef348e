//! bwc - declare and install subagents, commands, and MCP servers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bwc::config::{ConfigScope, ConfigStore, ScopeOverride};
use bwc::errors::{Error, Result};
use bwc::install::{
    install_declared, install_file_item, install_server, remove_file_item, remove_server,
    InstallOptions, ItemKind, ServerInstallReport,
};
use bwc::models::{MethodKind, NetworkTransport, Scope};
use bwc::provider::Hints;
use bwc::registry::Registry;
use bwc::runner::SystemRunner;
use bwc::verify::{verify, VerificationStatus};

#[derive(Parser)]
#[command(name = "bwc")]
#[command(about = "Declare and install subagents, commands, and MCP servers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use the user-level config even when a project config exists
    #[arg(long, global = true)]
    user: bool,

    /// Require a project config (error when none is found)
    #[arg(long, global = true)]
    project: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a config file in the current directory (or, with --user,
    /// the user-level config)
    Init,

    /// Add an item from the registry
    Add {
        #[command(subcommand)]
        item: AddItem,
    },

    /// Remove an installed item
    Remove {
        #[command(subcommand)]
        item: RemoveItem,
    },

    /// List everything the active config has installed
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search the registry
    Search {
        /// Substring matched against names and descriptions
        query: String,
    },

    /// Install everything the config declares (bulk, continues on failure)
    Install,

    /// Cross-check declared servers against what is actually installed
    Status,
}

#[derive(Subcommand)]
enum AddItem {
    /// Install a subagent file
    Subagent { name: String },

    /// Install a command file
    Command { name: String },

    /// Install an MCP server
    Mcp {
        name: String,

        /// Install scope: local, user, or project
        #[arg(long)]
        scope: Option<Scope>,

        /// Force a provider: docker, npm, manual, binary, bwc, claude-cli
        #[arg(long)]
        provider: Option<MethodKind>,

        /// Connect directly over this transport (requires --url)
        #[arg(long)]
        transport: Option<NetworkTransport>,

        /// Server URL for direct network connections
        #[arg(long)]
        url: Option<String>,

        /// HTTP header as "Key: Value" (repeatable)
        #[arg(long = "header")]
        headers: Vec<String>,

        /// User-input value as name=value (repeatable)
        #[arg(long = "set")]
        set: Vec<String>,

        /// Re-run the provider action even if already installed
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum RemoveItem {
    Subagent { name: String },
    Command { name: String },
    Mcp { name: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let preference = match (cli.user, cli.project) {
        (true, _) => ScopeOverride::ForceUser,
        (_, true) => ScopeOverride::ForceProject,
        _ => ScopeOverride::Auto,
    };

    match cli.command {
        Commands::Init => {
            let scope = if cli.user {
                ConfigScope::User
            } else {
                ConfigScope::Project
            };
            let store = ConfigStore::init(&cwd(), scope)?;
            println!("Initialized {}", store.manifest_path().display());
            Ok(())
        }
        Commands::Add { item } => {
            let mut store = ConfigStore::discover(&cwd(), preference)?;
            let registry = Registry::fetch(store.registry_url())?;
            match item {
                AddItem::Subagent { name } => {
                    let path = install_file_item(&mut store, &registry, ItemKind::Subagent, &name)?;
                    println!("Installed subagent {} -> {}", name, path.display());
                }
                AddItem::Command { name } => {
                    let path = install_file_item(&mut store, &registry, ItemKind::Command, &name)?;
                    println!("Installed command {} -> {}", name, path.display());
                }
                AddItem::Mcp {
                    name,
                    scope,
                    provider,
                    transport,
                    url,
                    headers,
                    set,
                    force,
                } => {
                    let opts = InstallOptions {
                        scope,
                        hints: Hints {
                            provider,
                            transport,
                            url,
                        },
                        inputs: parse_kv_pairs(&set)?,
                        headers: parse_headers(&headers)?,
                        force,
                    };
                    let report =
                        install_server(&mut store, &registry, &name, &opts, &SystemRunner)?;
                    print_server_report(&name, &report);
                }
            }
            Ok(())
        }
        Commands::Remove { item } => {
            let mut store = ConfigStore::discover(&cwd(), preference)?;
            let (name, removed) = match item {
                RemoveItem::Subagent { name } => {
                    let removed = remove_file_item(&mut store, ItemKind::Subagent, &name)?;
                    (name, removed)
                }
                RemoveItem::Command { name } => {
                    let removed = remove_file_item(&mut store, ItemKind::Command, &name)?;
                    (name, removed)
                }
                RemoveItem::Mcp { name } => {
                    let removed = remove_server(&mut store, &name)?;
                    (name, removed)
                }
            };
            if removed {
                println!("Removed {}", name);
            } else {
                println!("{} was not installed", name);
            }
            Ok(())
        }
        Commands::List { json } => {
            let store = ConfigStore::discover(&cwd(), preference)?;
            let installed = &store.config().installed;
            if json {
                println!("{}", serde_json::to_string_pretty(installed)?);
                return Ok(());
            }
            if installed.subagents.is_empty()
                && installed.commands.is_empty()
                && installed.mcp_servers.is_empty()
            {
                println!("Nothing installed yet.");
                return Ok(());
            }
            for name in &installed.subagents {
                println!("subagent    {}", name);
            }
            for name in &installed.commands {
                println!("command     {}", name);
            }
            for (name, cfg) in &installed.mcp_servers {
                println!(
                    "mcp-server  {}  ({}, {}, {})",
                    name,
                    cfg.provider,
                    cfg.endpoint.transport_name(),
                    cfg.scope
                );
            }
            Ok(())
        }
        Commands::Search { query } => {
            let store = ConfigStore::discover(&cwd(), preference)?;
            let registry = Registry::fetch(store.registry_url())?;
            let rows = registry.search(&query);
            if rows.is_empty() {
                println!("No matches for '{}'.", query);
                return Ok(());
            }
            for (kind, name, description) in rows {
                println!("{:<11} {:<24} {}", kind, name, description);
            }
            Ok(())
        }
        Commands::Install => {
            let mut store = ConfigStore::discover(&cwd(), preference)?;
            let registry = Registry::fetch(store.registry_url())?;
            let summary = install_declared(&mut store, &registry, &SystemRunner);
            println!(
                "Installed {} item(s), {} failed.",
                summary.succeeded, summary.failed
            );
            for (name, error) in &summary.failures {
                eprintln!("  {}: {}", name, error);
            }
            Ok(())
        }
        Commands::Status => {
            let store = ConfigStore::discover(&cwd(), preference)?;
            let results = verify(&store.config().installed.mcp_servers, &SystemRunner);
            if results.is_empty() {
                println!("No MCP servers configured.");
                return Ok(());
            }
            for r in results {
                let status = match r.status {
                    VerificationStatus::Connected => "connected",
                    VerificationStatus::NotInstalled => "not installed",
                    VerificationStatus::GatewayNotConfigured => "gateway not configured",
                };
                println!("{:<24} {:<8} {}", r.name, r.provider, status);
                if let Some(remediation) = r.remediation {
                    println!("        {}", remediation);
                }
            }
            Ok(())
        }
    }
}

fn cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn parse_kv_pairs(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for entry in raw {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(Error::Validation(vec![format!(
                "--set expects name=value, got '{entry}'"
            )]));
        };
        map.insert(key.trim().to_string(), value.to_string());
    }
    Ok(map)
}

fn parse_headers(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| {
                    Error::Validation(vec![format!("--header expects 'Key: Value', got '{entry}'")])
                })
        })
        .collect()
}

fn print_server_report(name: &str, report: &ServerInstallReport) {
    match report {
        ServerInstallReport::Installed { warnings } => {
            println!("Installed {}", name);
            for w in warnings {
                eprintln!("Warning: {}", w);
            }
        }
        ServerInstallReport::AlreadyInstalled => {
            println!("{} is already installed (use --force to re-run)", name);
        }
        ServerInstallReport::ManualSteps(steps) => {
            println!("{} requires manual installation:", name);
            for (i, step) in steps.iter().enumerate() {
                println!("  {}. {}", i + 1, step);
            }
        }
        ServerInstallReport::GatewayNotConfigured { remediation } => {
            println!("{} was not installed: gateway not configured.", name);
            println!("{}", remediation);
        }
    }
}
