//! Check command - verify the server connection end to end.

use std::time::Duration;

use console::style;
use tracing::error;

use pw_core::config::ConfigHandle;
use pw_core::error::PwResult;
use pw_core::platform::Platform;
use pw_realtime::RealtimeClient;

/// Run the check command.
pub async fn run(
    config: ConfigHandle,
    address: Option<String>,
    token: Option<String>,
    save_config: bool,
) -> PwResult<()> {
    let (address, token) = super::resolve_connection(&config, address, token).await?;

    println!(
        "{} Connecting to {}...",
        style("[1/2]").bold().dim(),
        address
    );

    // a quick probe, not a patient client: one retry, then report
    let realtime = config.read().await.realtime.clone().with_max_attempts(1);
    let client = RealtimeClient::new(&address, realtime);
    let state_rx = client.state_receiver();
    client.connect(token);

    match super::wait_until_open(state_rx, Duration::from_secs(30)).await {
        Ok(()) => {
            println!(
                "  {} Websocket feed is reachable.",
                style("OK").green().bold()
            );
        }
        Err(e) => {
            println!("  {} Could not connect: {e}", style("FAIL").red().bold());
            error!(server = %address, error = %e, "connection check failed");
            client.disconnect();
            return Err(e);
        }
    }
    client.disconnect();

    if save_config {
        println!("{} Saving configuration...", style("[2/2]").bold().dim());
        let cfg = config.read().await;
        let path = Platform::config_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join("config.toml");
        cfg.save_to_file(&path)?;
        println!(
            "  {} Config saved to {}",
            style("OK").green(),
            path.display()
        );
    }

    Ok(())
}
