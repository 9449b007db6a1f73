//! CLI Module
//!
//! Command-line interface for wa-recency using Clap v4.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::logging;
use crate::server::{self, AppState};
use crate::session::BridgeSessionFactory;

/// wa-recency - find out who you last talked to on WhatsApp
#[derive(Parser, Debug)]
#[command(name = "wa-recency")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug mode (creates log files in ~/.wa-recency/logs/)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the web server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory with the front-end assets
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Base URL of the automation bridge
        #[arg(long)]
        bridge_url: Option<String>,

        /// Also print login QR codes in this terminal
        #[arg(long)]
        print_qr: bool,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Config,

    /// Log management operations
    Logs {
        #[command(subcommand)]
        operation: LogCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum LogCommands {
    /// Show log file location and status
    Status,
    /// Clean up old log files
    Clean {
        /// Maximum age in days (default: 7)
        #[arg(short = 'a', long, default_value = "7")]
        days: u64,
    },
}

/// Load configuration for this invocation. `init` never reads an existing
/// file, so a broken config cannot block regenerating it.
pub fn load_config(cli: &Cli) -> Result<Config> {
    if matches!(cli.command, Some(Commands::Init { .. })) {
        return Ok(Config::default());
    }
    match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

/// Run the selected command with an already-loaded configuration
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        None => cmd_serve(config).await,
        Some(Commands::Serve {
            port,
            static_dir,
            bridge_url,
            print_qr,
        }) => {
            let mut config = config;
            apply_serve_overrides(&mut config, port, static_dir, bridge_url, print_qr);
            cmd_serve(config).await
        }
        Some(Commands::Init { force }) => cmd_init(cli.config, force),
        Some(Commands::Config) => cmd_config(&config),
        Some(Commands::Logs { operation }) => cmd_logs(operation),
    }
}

fn apply_serve_overrides(
    config: &mut Config,
    port: Option<u16>,
    static_dir: Option<PathBuf>,
    bridge_url: Option<String>,
    print_qr: bool,
) {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(dir) = static_dir {
        config.server.static_dir = dir;
    }
    if let Some(url) = bridge_url {
        config.bridge.base_url = url;
    }
    if print_qr {
        config.server.print_qr = true;
    }
}

async fn cmd_serve(config: Config) -> Result<()> {
    config.validate()?;

    let factory = BridgeSessionFactory::new(&config.bridge)
        .context("Failed to build automation bridge client")?;
    let state = AppState {
        config: Arc::new(config),
        factory: Arc::new(factory),
    };

    tracing::info!("Starting wa-recency v{}", crate::VERSION);
    server::serve(state).await
}

/// Initialize configuration file
fn cmd_init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = path.unwrap_or_else(Config::system_config_path);

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at: {}\nUse --force to overwrite",
            config_path.display()
        );
    }

    Config::default().save(&config_path)?;

    println!("Configuration initialized at: {}", config_path.display());
    println!("\nNext steps:");
    println!("   1. Start the automation bridge (default http://127.0.0.1:3002)");
    println!("   2. Run 'wa-recency serve' and open http://localhost:3001");

    Ok(())
}

/// Show configuration
fn cmd_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("# System config: {}", Config::system_config_path().display());
    println!("{}", rendered);
    Ok(())
}

fn cmd_logs(operation: LogCommands) -> Result<()> {
    let log_dir = log_dir();

    match operation {
        LogCommands::Status => {
            println!("Log directory: {}", log_dir.display());
            if !log_dir.exists() {
                println!("No logs yet (run with --debug to enable file logging)");
                return Ok(());
            }
            let count = std::fs::read_dir(&log_dir)
                .with_context(|| format!("Failed to read {}", log_dir.display()))?
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_file())
                .count();
            println!("Log files: {}", count);
            Ok(())
        }
        LogCommands::Clean { days } => {
            match logging::cleanup_old_logs(&log_dir, days) {
                Ok(0) => println!("No log files older than {} days", days),
                Ok(removed) => println!("Removed {} old log file(s)", removed),
                Err(e) => anyhow::bail!("Failed to clean logs: {}", e),
            }
            Ok(())
        }
    }
}

/// Log directory honoring `DEBUG_LOGS_LOCATION`
pub fn log_dir() -> PathBuf {
    let mut config = logging::LogConfig::new();
    if let Ok(dir) = std::env::var("DEBUG_LOGS_LOCATION") {
        config = config.with_log_dir(PathBuf::from(dir));
    }
    config.log_dir()
}
