//! Connection lifecycle: the client handle and the actor task behind it.
//!
//! All mutable state (the live link, the subscription registry, the reconnect
//! schedule) is owned by one background [`ConnectionActor`] task. The public
//! [`RealtimeClient`] is a cheap cloneless handle that sends the actor
//! commands over an unbounded channel and observes state on a watch channel.
//! At most one physical link exists at a time; each carries a generation
//! number so events from a replaced link are discarded instead of corrupting
//! the current one.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace, warn};

use pw_core::config::{AppConfig, RealtimeConfig};
use pw_core::constants;
use pw_core::error::{PwError, PwResult};

use crate::backoff::ReconnectPolicy;
use crate::protocol::{parse_event, ControlFrame};
use crate::registry::{SubscriptionRegistry, WireAction};
use crate::status::{ConnectionError, ConnectionState, DisconnectReason, StatusHandlers};
use crate::subscription::{Subscription, SubscriptionId};
use crate::transport::{Transport, TransportEvent, TransportLink, WsTransport};

/// Commands the client handle sends to the actor.
pub(crate) enum Cmd {
    Connect {
        token: String,
    },
    Subscribe {
        channel: String,
        result_tx: oneshot::Sender<(SubscriptionId, mpsc::Receiver<Value>)>,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    Disconnect,
}

/// Handle to the realtime channel client.
///
/// Must be created inside a tokio runtime; construction spawns the
/// connection task. Dropping the handle and every [`Subscription`] shuts the
/// task down and closes any live connection.
pub struct RealtimeClient {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    state_rx: watch::Receiver<ConnectionState>,
    _task: JoinHandle<()>,
}

impl RealtimeClient {
    /// Create a client for `server_address` using the production websocket
    /// transport. The address is normalized the same way the config layer
    /// does it, so `https://pool.example.com/` and `wss://pool.example.com`
    /// are equivalent.
    pub fn new(server_address: &str, config: RealtimeConfig) -> Self {
        Self::with_handlers(server_address, config, StatusHandlers::default())
    }

    /// Same as [`new`](RealtimeClient::new) with status callbacks attached.
    pub fn with_handlers(
        server_address: &str,
        config: RealtimeConfig,
        handlers: StatusHandlers,
    ) -> Self {
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        Self::with_transport(
            server_address,
            config,
            handlers,
            Box::new(WsTransport::new(connect_timeout)),
        )
    }

    /// Create a client over a caller-supplied transport. This is the seam
    /// the test suite drives the client through.
    pub fn with_transport(
        server_address: &str,
        config: RealtimeConfig,
        handlers: StatusHandlers,
        transport: Box<dyn Transport>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let actor = ConnectionActor {
            base_url: AppConfig::sanitize_server_address(server_address),
            policy: ReconnectPolicy::from_config(&config),
            subscription_buffer: config.subscription_buffer,
            handlers,
            transport,
            registry: SubscriptionRegistry::new(),
            cmd_rx,
            state_tx,
            token: None,
            generation: 0,
            attempts: 0,
            link: None,
            retry_at: None,
        };
        let task = tokio::spawn(actor.run());

        Self {
            cmd_tx,
            state_rx,
            _task: task,
        }
    }

    /// Start connecting with `token`. Repeated calls while a connection is
    /// live or scheduled are ignored; after a deliberate disconnect or an
    /// exhausted reconnect budget this starts a fresh attempt cycle.
    pub fn connect(&self, token: impl Into<String>) {
        let _ = self.cmd_tx.send(Cmd::Connect {
            token: token.into(),
        });
    }

    /// Subscribe to `channel`. Works in any connection state; while
    /// disconnected the server-side subscription is deferred until the next
    /// connection opens.
    pub async fn subscribe(&self, channel: impl Into<String>) -> PwResult<Subscription> {
        let channel = channel.into();
        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(Cmd::Subscribe {
                channel: channel.clone(),
                result_tx,
            })
            .map_err(|_| PwError::ClientClosed)?;
        let (id, rx) = result_rx.await.map_err(|_| PwError::ClientClosed)?;
        Ok(Subscription::new(id, channel, rx, self.cmd_tx.clone()))
    }

    /// Tear down the connection and cancel any pending reconnect.
    /// Subscriptions stay registered and are replayed on the next
    /// [`connect`](RealtimeClient::connect).
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Cmd::Disconnect);
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A watch receiver for following state transitions.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }
}

impl fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("state", &self.state())
            .finish()
    }
}

/// One live physical link and the generation it belongs to.
struct ActiveLink {
    generation: u64,
    link: Box<dyn TransportLink>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    open: bool,
}

struct ConnectionActor {
    base_url: String,
    policy: ReconnectPolicy,
    subscription_buffer: usize,
    handlers: StatusHandlers,
    transport: Box<dyn Transport>,
    registry: SubscriptionRegistry,
    cmd_rx: mpsc::UnboundedReceiver<Cmd>,
    state_tx: watch::Sender<ConnectionState>,
    /// Token from the last `connect()`; cleared on deliberate disconnect and
    /// on exhaustion so a stale retry can never reuse it.
    token: Option<String>,
    generation: u64,
    /// Consecutive failed attempts since the last successful open.
    attempts: u32,
    link: Option<ActiveLink>,
    /// Deadline of the pending reconnect, when one is scheduled.
    retry_at: Option<Instant>,
}

impl ConnectionActor {
    async fn run(mut self) {
        loop {
            if let Some(active) = self.link.as_mut() {
                let generation = active.generation;
                tokio::select! {
                    biased;
                    cmd = self.cmd_rx.recv() => match cmd {
                        Some(cmd) => self.handle_cmd(cmd),
                        None => {
                            self.shutdown();
                            break;
                        }
                    },
                    event = active.events.recv() => {
                        // a vanished event stream reads as an unannounced close
                        let event = event.unwrap_or(TransportEvent::Closed(None));
                        self.handle_transport_event(generation, event);
                    }
                }
            } else if let Some(deadline) = self.retry_at {
                tokio::select! {
                    biased;
                    cmd = self.cmd_rx.recv() => match cmd {
                        Some(cmd) => self.handle_cmd(cmd),
                        None => {
                            self.shutdown();
                            break;
                        }
                    },
                    _ = time::sleep_until(deadline) => {
                        self.retry_at = None;
                        self.open_link();
                    }
                }
            } else {
                match self.cmd_rx.recv().await {
                    Some(cmd) => self.handle_cmd(cmd),
                    None => {
                        self.shutdown();
                        break;
                    }
                }
            }
        }
    }

    fn handle_cmd(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::Connect { token } => self.handle_connect(token),
            Cmd::Subscribe { channel, result_tx } => self.handle_subscribe(channel, result_tx),
            Cmd::Unsubscribe { id } => self.handle_unsubscribe(id),
            Cmd::Disconnect => self.handle_disconnect(),
        }
    }

    fn handle_connect(&mut self, token: String) {
        if self.link.is_some() || self.retry_at.is_some() {
            debug!("connect requested while already active, ignoring");
            return;
        }
        self.token = Some(token);
        self.attempts = 0;
        self.set_state(ConnectionState::Connecting);
        self.open_link();
    }

    fn open_link(&mut self) {
        let Some(token) = self.token.clone() else {
            // disconnect raced the retry timer
            return;
        };
        self.generation += 1;
        let url = build_ws_url(&self.base_url, &token);
        debug!(server = %self.base_url, generation = self.generation, "opening websocket");
        let (link, events) = self.transport.open(&url);
        self.link = Some(ActiveLink {
            generation: self.generation,
            link,
            events,
            open: false,
        });
    }

    fn handle_subscribe(
        &mut self,
        channel: String,
        result_tx: oneshot::Sender<(SubscriptionId, mpsc::Receiver<Value>)>,
    ) {
        let open = self.link.as_ref().map_or(false, |l| l.open);
        let (id, rx, action) = self.registry.add(&channel, self.subscription_buffer, open);
        debug!(channel = %channel, subscription = id, wired = action.is_some(), "subscriber added");
        if let Some(action) = action {
            self.send_wire(&action);
        }
        if result_tx.send((id, rx)).is_err() {
            // caller gave up waiting, roll the registration back
            if let Some(action) = self.registry.remove(id) {
                self.send_wire(&action);
            }
        }
    }

    fn handle_unsubscribe(&mut self, id: SubscriptionId) {
        if let Some(action) = self.registry.remove(id) {
            debug!(channel = action.channel(), subscription = id, "last subscriber gone");
            self.send_wire(&action);
        }
    }

    fn handle_disconnect(&mut self) {
        self.retry_at = None;
        self.token = None;
        self.attempts = 0;
        self.registry.reset_wire_state();
        if let Some(active) = self.link.take() {
            self.set_state(ConnectionState::Closing);
            let was_open = active.open;
            active.link.close();
            if was_open {
                self.handlers.emit_disconnect(DisconnectReason {
                    message: "disconnect requested".to_string(),
                    code: None,
                });
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if self.link.as_ref().map_or(true, |l| l.generation != generation) {
            trace!(generation, "discarding event from replaced link");
            return;
        }
        match event {
            TransportEvent::Opened => self.handle_opened(),
            TransportEvent::Message(raw) => self.handle_message(&raw),
            TransportEvent::Errored(message) => {
                warn!(error = %message, "transport error");
                self.handlers.emit_error(ConnectionError {
                    message: message.clone(),
                    recoverable: true,
                });
                self.connection_lost(&message, None);
            }
            TransportEvent::Closed(code) => self.connection_lost("connection closed", code),
        }
    }

    fn handle_opened(&mut self) {
        if let Some(active) = self.link.as_mut() {
            active.open = true;
        }
        self.attempts = 0;
        self.set_state(ConnectionState::Open);
        info!(server = %self.base_url, "realtime connection open");
        self.handlers.emit_connect();
        // replay every live channel before any inbound event is processed
        for action in self.registry.flush_all() {
            self.send_wire(&action);
        }
    }

    fn handle_message(&mut self, raw: &str) {
        if let Some(frame) = parse_event(raw) {
            let delivered = self.registry.dispatch(&frame.channel, &frame.data);
            trace!(channel = %frame.channel, delivered, "event dispatched");
        }
    }

    fn connection_lost(&mut self, reason: &str, code: Option<u16>) {
        let was_open = self.link.take().map_or(false, |l| l.open);
        self.registry.reset_wire_state();
        if was_open {
            self.handlers.emit_disconnect(DisconnectReason {
                message: reason.to_string(),
                code,
            });
        }

        self.attempts += 1;
        if self.policy.should_retry(self.attempts) {
            let delay = self.policy.next_delay(self.attempts);
            info!(
                attempt = self.attempts,
                max_attempts = self.policy.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                close_code = ?code,
                "connection lost, reconnect scheduled"
            );
            self.set_state(ConnectionState::Reconnecting);
            self.retry_at = Some(Instant::now() + delay);
        } else {
            let retries = self.attempts - 1;
            warn!(retries, "reconnect attempts exhausted, giving up");
            self.handlers.emit_error(ConnectionError {
                message: format!("reconnect attempts exhausted after {retries} retries"),
                recoverable: false,
            });
            self.token = None;
            self.set_state(ConnectionState::Disconnected);
        }
    }

    fn send_wire(&self, action: &WireAction) {
        let Some(active) = self.link.as_ref() else {
            return;
        };
        if !active.open {
            return;
        }
        let frame = match action {
            WireAction::Subscribe(channel) => ControlFrame::subscribe(channel.as_str()),
            WireAction::Unsubscribe(channel) => ControlFrame::unsubscribe(channel.as_str()),
        };
        match frame.to_json() {
            Ok(json) => {
                if let Err(e) = active.link.send(json) {
                    // the link died under us; the close event will reset wire
                    // state and the next open replays the channel
                    debug!(error = %e, channel = action.channel(), "control frame not sent");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode control frame"),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let prev = *self.state_tx.borrow();
        if prev != state {
            debug!(from = %prev, to = %state, "connection state change");
            let _ = self.state_tx.send(state);
        }
    }

    fn shutdown(&mut self) {
        debug!("all client handles dropped, shutting down");
        self.retry_at = None;
        if let Some(active) = self.link.take() {
            active.link.close();
        }
        let _ = self.state_tx.send(ConnectionState::Disconnected);
    }
}

fn build_ws_url(base_url: &str, token: &str) -> String {
    format!(
        "{}{}?token={}",
        base_url.trim_end_matches('/'),
        constants::WS_PATH,
        token
    )
}
