//! PoolWatch CLI - Command-line interface for the PoolWatch realtime feed.
//!
//! Connects to a pool dashboard server over its websocket feed for headless
//! monitoring, scripting, and connection debugging.

mod commands;

use clap::{Parser, Subcommand};
use tracing::info;

use pw_core::config::{AppConfig, ConfigHandle};
use pw_core::error::PwResult;
use pw_core::logging;
use pw_core::platform::Platform;

/// PoolWatch - live mining pool dashboard feed.
#[derive(Parser)]
#[command(
    name = "poolwatch",
    version,
    about = "PoolWatch realtime feed CLI",
    long_about = "A command-line client for the PoolWatch dashboard feed.\n\
                   Subscribe to pool event channels and stream them to the terminal."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the server connection and report the result.
    Check {
        /// Server address (overrides config).
        #[arg(short, long)]
        address: Option<String>,
        /// API token (overrides config).
        #[arg(short, long)]
        token: Option<String>,
        /// Save connection settings to the config file on success.
        #[arg(long)]
        save: bool,
    },
    /// Stream live events from one or more channels.
    Tail {
        /// Server address (overrides config).
        #[arg(short, long)]
        address: Option<String>,
        /// API token (overrides config).
        #[arg(short, long)]
        token: Option<String>,
        /// Channel to stream; repeatable. Defaults to mining and blocks.
        #[arg(short = 'C', long = "channel")]
        channels: Vec<String>,
        /// Emit one JSON object per event instead of formatted text.
        #[arg(long)]
        json: bool,
    },
    /// View and modify the configuration.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> PwResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if let Some(path) = cli.config.as_deref() {
        AppConfig::load_from_file(std::path::Path::new(path))?
    } else {
        let default_path = Platform::config_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join("config.toml");
        if default_path.exists() {
            AppConfig::load_from_file(&default_path)?
        } else {
            AppConfig::default()
        }
    };

    // Initialize logging from the [logging] section; --verbose overrides the
    // level. Config edits are local and quick, so they skip the log file.
    let _guard = match &cli.command {
        Commands::Config { .. } => {
            logging::init_console_logging(if cli.verbose { "debug" } else { "info" });
            None
        }
        _ => {
            let mut logging_config = config.logging.clone();
            if cli.verbose {
                logging_config.level = "debug".to_string();
            }
            let log_dir = config.effective_log_dir()?;
            Some(logging::init_logging(&logging_config, &log_dir)?)
        }
    };

    let config_handle = ConfigHandle::new(config);

    info!("PoolWatch CLI v{}", pw_core::constants::APP_VERSION);

    // Dispatch to command handlers
    match cli.command {
        Commands::Check { address, token, save } => {
            commands::check::run(config_handle, address, token, save).await
        }
        Commands::Tail { address, token, channels, json } => {
            commands::tail::run(config_handle, address, token, channels, json).await
        }
        Commands::Config { action } => commands::config::run(config_handle, action).await,
    }
}
