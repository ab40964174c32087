//! CLI command implementations.

pub mod check;
pub mod config;
pub mod tail;

use std::time::Duration;

use dialoguer::{Input, Password};
use tokio::sync::watch;

use pw_core::config::{AppConfig, ConfigHandle};
use pw_core::error::{PwError, PwResult};
use pw_realtime::ConnectionState;

/// Resolve the server address and token: argument > config > prompt.
///
/// Resolved values are written back into the in-memory config so a later
/// `--save` persists them.
pub async fn resolve_connection(
    config: &ConfigHandle,
    address: Option<String>,
    token: Option<String>,
) -> PwResult<(String, String)> {
    let address = if let Some(a) = address {
        a
    } else {
        let current = config.read().await.server.address.clone();
        if current.is_empty() {
            Input::new()
                .with_prompt("Server address")
                .interact_text()
                .map_err(|e| PwError::Internal(e.to_string()))?
        } else {
            current
        }
    };

    let token = if let Some(t) = token {
        t
    } else {
        let current = config.read().await.server.token.clone();
        if current.is_empty() {
            Password::new()
                .with_prompt("API token")
                .interact()
                .map_err(|e| PwError::Internal(e.to_string()))?
        } else {
            current
        }
    };

    let address = AppConfig::sanitize_server_address(&address);
    if address.is_empty() {
        return Err(PwError::MissingConfig("server address".into()));
    }

    {
        let mut cfg = config.write().await;
        cfg.server.address = address.clone();
        cfg.server.token = token.clone();
    }
    Ok((address, token))
}

/// Wait until the connection reaches open. Fails when it settles on
/// disconnected instead, or when `limit` passes first.
pub async fn wait_until_open(
    mut state_rx: watch::Receiver<ConnectionState>,
    limit: Duration,
) -> PwResult<()> {
    let wait = async {
        loop {
            if state_rx.changed().await.is_err() {
                return Err(PwError::ClientClosed);
            }
            match *state_rx.borrow() {
                ConnectionState::Open => return Ok(()),
                ConnectionState::Disconnected => {
                    return Err(PwError::Connection("could not reach the server".into()))
                }
                _ => {}
            }
        }
    };
    tokio::time::timeout(limit, wait)
        .await
        .map_err(|_| PwError::Timeout(limit.as_millis() as u64))?
}
