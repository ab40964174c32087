//! Config commands.

use clap::Subcommand;
use console::style;

use pw_core::config::{AppConfig, ConfigHandle};
use pw_core::error::{PwError, PwResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the current configuration (token masked).
    Show,
    /// Set a configuration value by key path (e.g., "server.address").
    Set {
        /// Setting key path.
        key: String,
        /// New value.
        value: String,
    },
    /// Write a fresh default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

/// Run a config command.
pub async fn run(config: ConfigHandle, action: ConfigAction) -> PwResult<()> {
    match action {
        ConfigAction::Show => show(config).await,
        ConfigAction::Set { key, value } => set(config, &key, &value).await,
        ConfigAction::Init { force } => init(force),
    }
}

async fn show(config: ConfigHandle) -> PwResult<()> {
    let mut cfg = config.read().await.clone();
    if !cfg.server.token.is_empty() {
        cfg.server.token = "********".to_string();
    }
    let rendered = toml::to_string_pretty(&cfg)
        .map_err(|e| PwError::Config(format!("failed to render config: {e}")))?;

    println!("# {}", AppConfig::default_config_path()?.display());
    println!("{rendered}");
    Ok(())
}

async fn set(config: ConfigHandle, key: &str, value: &str) -> PwResult<()> {
    {
        let mut cfg = config.write().await;
        match key {
            "server.address" => cfg.server.address = AppConfig::sanitize_server_address(value),
            "server.token" => cfg.server.token = value.to_string(),
            "logging.level" => cfg.logging.level = value.to_string(),
            "logging.directory" => cfg.logging.directory = value.to_string(),
            "realtime.base_delay_ms" => cfg.realtime.base_delay_ms = parse(key, value)?,
            "realtime.backoff_multiplier" => cfg.realtime.backoff_multiplier = parse(key, value)?,
            "realtime.jitter_ms" => cfg.realtime.jitter_ms = parse(key, value)?,
            "realtime.max_delay_ms" => cfg.realtime.max_delay_ms = parse(key, value)?,
            "realtime.max_attempts" => cfg.realtime.max_attempts = parse(key, value)?,
            "realtime.connect_timeout_ms" => cfg.realtime.connect_timeout_ms = parse(key, value)?,
            "realtime.subscription_buffer" => cfg.realtime.subscription_buffer = parse(key, value)?,
            _ => return Err(PwError::Config(format!("unknown setting: {key}"))),
        }
    }
    config.save().await?;
    println!("  {} {key} updated.", style("OK").green().bold());
    Ok(())
}

fn init(force: bool) -> PwResult<()> {
    let path = AppConfig::default_config_path()?;
    if path.exists() && !force {
        return Err(PwError::Config(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }
    AppConfig::default().save_to_file(&path)?;
    println!(
        "  {} Default config written to {}",
        style("OK").green().bold(),
        path.display()
    );
    Ok(())
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> PwResult<T> {
    value
        .parse()
        .map_err(|_| PwError::Config(format!("invalid value for {key}: {value}")))
}
