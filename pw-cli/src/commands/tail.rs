//! Tail command - stream live channel events to the terminal.
//!
//! Event lines go to stdout; connection status goes to stderr so the event
//! stream stays clean for piping, with or without `--json`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use console::style;
use serde_json::json;

use pw_core::config::ConfigHandle;
use pw_core::constants::channels;
use pw_core::error::PwResult;
use pw_realtime::{ConnectionState, RealtimeClient, StatusHandlers};

/// Run the tail command.
pub async fn run(
    config: ConfigHandle,
    address: Option<String>,
    token: Option<String>,
    requested: Vec<String>,
    json_output: bool,
) -> PwResult<()> {
    let (address, token) = super::resolve_connection(&config, address, token).await?;

    let channels: Vec<String> = if requested.is_empty() {
        channels::DEFAULT_TAIL.iter().map(|c| c.to_string()).collect()
    } else {
        requested
    };

    let opened_before = Arc::new(AtomicBool::new(false));
    let opened = opened_before.clone();
    let handlers = StatusHandlers::new()
        .on_connect(move || {
            // the initial open is announced by the main flow below
            if opened.swap(true, Ordering::SeqCst) {
                eprintln!("  {} Reconnected.", style("OK").green().bold());
            }
        })
        .on_disconnect(|reason| {
            let code = reason
                .code
                .map(|c| format!(" (code {c})"))
                .unwrap_or_default();
            eprintln!(
                "  {} Connection lost: {}{code}",
                style("WARN").yellow().bold(),
                reason.message
            );
        })
        .on_error(|e| {
            if e.recoverable {
                eprintln!("  {} {}", style("WARN").yellow().bold(), e.message);
            } else {
                eprintln!("  {} {}", style("FAIL").red().bold(), e.message);
            }
        });

    let realtime = config.read().await.realtime.clone();
    let client = RealtimeClient::with_handlers(&address, realtime, handlers);
    let mut state_rx = client.state_receiver();
    client.connect(token);

    super::wait_until_open(state_rx.clone(), Duration::from_secs(30)).await?;
    eprintln!(
        "  {} Connected. Streaming {} (Ctrl+C to stop)",
        style("OK").green().bold(),
        channels.join(", ")
    );

    for channel in &channels {
        let mut sub = client.subscribe(channel.clone()).await?;
        let name = channel.clone();
        tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                if json_output {
                    println!("{}", json!({ "channel": name, "data": event }));
                } else {
                    let stamp = chrono::Local::now().format("%H:%M:%S");
                    println!(
                        "  {} {} {}",
                        style(format!("[{stamp}]")).dim(),
                        style(format!("[{name}]")).cyan(),
                        event
                    );
                }
            }
        });
    }

    // Stream until interrupted or the reconnect budget runs out
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n  Disconnecting...");
                client.disconnect();
                break;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if *state_rx.borrow() == ConnectionState::Disconnected {
                    eprintln!(
                        "  {} Gave up reconnecting; exiting.",
                        style("FAIL").red().bold()
                    );
                    break;
                }
            }
        }
    }

    Ok(())
}
