mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use cp_core::config::Config;
use cp_telemetry::logging::{self, LogFormat};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// codepress -- inspect the extension bridge configuration.
#[derive(Parser)]
#[command(name = "codepress", version, about)]
struct Cli {
    /// Config file to use instead of ~/.codepress/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines regardless of `general.log_format`.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show, validate or locate the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the candidate extension ids in probe and delivery order.
    Candidates {
        /// Id to treat as the cached validated extension.
        #[arg(long)]
        preferred: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Check the configuration and report problems.
    Validate,
    /// Print the default configuration path.
    Path,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Works even when the file at that path is broken.
        Commands::Config {
            action: ConfigAction::Path,
        } => commands::config::path(),
        Commands::Config { action } => {
            let config = setup(cli.config.as_deref(), cli.json_logs)?;
            match action {
                ConfigAction::Show => commands::config::show(&config)?,
                ConfigAction::Validate => commands::config::validate(&config)?,
                ConfigAction::Path => commands::config::path(),
            }
        }
        Commands::Candidates { preferred } => {
            let config = setup(cli.config.as_deref(), cli.json_logs)?;
            commands::candidates::run(&config, preferred.as_deref());
        }
    }

    Ok(())
}

/// Load the configuration and start logging as it asks.
fn setup(path: Option<&Path>, json_logs: bool) -> anyhow::Result<Config> {
    let config = load_config(path)?;
    let format = if json_logs {
        LogFormat::Json
    } else {
        LogFormat::from_config(&config.general.log_format)
    };
    logging::init("codepress", &config.general.log_level, format);
    tracing::debug!(
        project = %config.general.project_name,
        extension_id = ?config.extension.extension_id,
        "configuration loaded"
    );
    Ok(config)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };
    Ok(config)
}
