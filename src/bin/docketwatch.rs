//! Docketwatch CLI — adapter catalogue inspection and config tooling.
//!
//! Usage:
//!   docketwatch adapters list
//!   docketwatch adapters families
//!   docketwatch adapters latest [--family v5]
//!   docketwatch adapters compatible <prefix>
//!   docketwatch config show [--config path]

use clap::{Parser, Subcommand};
use docketwatch::registry::AdapterRegistry;
use docketwatch::EngineConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "docketwatch",
    version,
    about = "Versioned-adapter extraction engine for electronic case portals"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the built-in adapter catalogue
    Adapters {
        #[command(subcommand)]
        action: AdapterAction,
    },
    /// Inspect engine configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum AdapterAction {
    /// List every registered adapter, newest first
    List,
    /// List the portal generations with registered adapters
    Families,
    /// Show the newest registered version
    Latest {
        /// Restrict to one family
        #[arg(long)]
        family: Option<String>,
    },
    /// List versions compatible with a dotted prefix, newest first
    Compatible {
        /// Version prefix, e.g. "4.2"
        prefix: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as YAML
    Show {
        /// Path to a YAML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("docketwatch").join("config.yaml"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    let registry = AdapterRegistry::global();

    match cli.command {
        Commands::Adapters { action } => match action {
            AdapterAction::List => {
                for version in registry.versions() {
                    if let Some(entry) = registry.get(&version) {
                        println!(
                            "{:10} family={:4} range={:6} {}",
                            version,
                            entry.descriptor.family,
                            entry.descriptor.version_range,
                            entry.descriptor.description
                        );
                    }
                }
            }
            AdapterAction::Families => {
                for family in registry.families() {
                    let versions = registry.versions_in_family(&family);
                    println!("{family}: {}", versions.join(", "));
                }
            }
            AdapterAction::Latest { family } => {
                match registry.latest(family.as_deref()) {
                    Some(version) => println!("{version}"),
                    None => {
                        eprintln!("no adapter registered");
                        std::process::exit(1);
                    }
                }
            }
            AdapterAction::Compatible { prefix } => {
                let matches = registry.find_compatible(&prefix);
                if matches.is_empty() {
                    eprintln!("no adapter compatible with '{prefix}'");
                    std::process::exit(1);
                }
                for version in matches {
                    println!("{version}");
                }
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show { config } => {
                let config = match config.or_else(default_config_path) {
                    Some(path) if path.exists() => EngineConfig::from_yaml_file(path)?,
                    _ => EngineConfig::default(),
                };
                print!("{}", serde_yaml::to_string(&config)?);
            }
        },
    }
    Ok(())
}
