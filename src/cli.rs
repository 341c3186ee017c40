// CLI module for handling command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use svforge::ServerType;

#[derive(Parser)]
#[command(name = "svforge", version)]
#[command(about = "Provision ready-to-run Minecraft servers (Vanilla, Paper, Spigot, Forge, Leaf)")]
pub struct Cli {
    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Server type: vanilla, paper, spigot, forge or leaf
    pub server_type: ServerType,
    /// Minecraft version, e.g. 1.21.8
    pub version: String,
    /// Build number or "latest" (paper, leaf, spigot)
    #[arg(long)]
    pub build: Option<String>,
    /// Forge version, e.g. 47.4.0 (forge only)
    #[arg(long = "forge-version")]
    pub forge_version: Option<String>,
    /// Maximum heap in MB
    #[arg(long)]
    pub ram: Option<u32>,
    #[arg(long)]
    pub port: Option<u32>,
    /// Target directory (defaults to <servers dir>/<type>-<version>)
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Fail instead of installing a missing Java runtime
    #[arg(long)]
    pub no_java_install: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a server into a new directory
    Install(InstallArgs),
    /// List available game versions for a server type
    Versions {
        server_type: ServerType,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List installed servers
    List,
    /// Show OS, Java installations, directories and disk space
    System {
        #[arg(long)]
        json: bool,
    },
    /// Manage the Spigot build cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show or reset the settings file
    Config {
        #[arg(long)]
        show: bool,
        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached Spigot builds
    List,
    /// Remove every cached Spigot build
    Clear,
}
