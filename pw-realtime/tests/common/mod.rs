//! Shared test utilities for integration tests.
//!
//! The realtime client is driven through an in-memory [`FakeTransport`]:
//! every `open()` call hands the test a [`FakeLink`] probe that can emit
//! transport events and record the frames the client sent. Tests run under
//! `start_paused = true`, so reconnect schedules elapse in virtual time.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};

use pw_core::config::RealtimeConfig;
use pw_core::error::{PwError, PwResult};
use pw_realtime::{
    RealtimeClient, StatusHandlers, Transport, TransportEvent, TransportHandle, TransportLink,
};

/// Test-side probe for one fake connection.
#[derive(Clone)]
pub struct FakeLink {
    pub url: String,
    sent: Arc<Mutex<Vec<String>>>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    open: Arc<Mutex<bool>>,
    closed: Arc<Mutex<bool>>,
}

impl FakeLink {
    /// Complete the fake handshake; the client may send frames from now on.
    pub fn emit_open(&self) {
        *self.open.lock().unwrap() = true;
        let _ = self.event_tx.send(TransportEvent::Opened);
    }

    /// Push an inbound event envelope for `channel`.
    pub fn emit_message(&self, channel: &str, data: Value) {
        let raw = json!({ "channel": channel, "data": data }).to_string();
        self.emit_raw(&raw);
    }

    /// Push a raw inbound text frame, malformed ones included.
    pub fn emit_raw(&self, raw: &str) {
        let _ = self.event_tx.send(TransportEvent::Message(raw.to_string()));
    }

    /// Simulate the connection going away.
    pub fn emit_close(&self, code: Option<u16>) {
        *self.open.lock().unwrap() = false;
        let _ = self.event_tx.send(TransportEvent::Closed(code));
    }

    /// Simulate a transport failure. Mirrors the real transport by following
    /// up with a close event.
    pub fn emit_error(&self, message: &str) {
        *self.open.lock().unwrap() = false;
        let _ = self.event_tx.send(TransportEvent::Errored(message.to_string()));
        let _ = self.event_tx.send(TransportEvent::Closed(None));
    }

    /// Everything the client sent over this link, in order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Whether the client asked this link to close.
    pub fn close_requested(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

/// The half handed to the client; shares its state with the probe.
struct FakeLinkHandle {
    sent: Arc<Mutex<Vec<String>>>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    open: Arc<Mutex<bool>>,
    closed: Arc<Mutex<bool>>,
}

impl TransportLink for FakeLinkHandle {
    fn send(&self, frame: String) -> PwResult<()> {
        if !*self.open.lock().unwrap() {
            return Err(PwError::NotConnected);
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self) {
        *self.closed.lock().unwrap() = true;
        *self.open.lock().unwrap() = false;
        let _ = self.event_tx.send(TransportEvent::Closed(None));
    }
}

/// Transport that records every connection attempt.
#[derive(Clone)]
pub struct FakeTransport {
    links: Arc<Mutex<Vec<FakeLink>>>,
    count_tx: Arc<watch::Sender<usize>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            links: Arc::new(Mutex::new(Vec::new())),
            count_tx: Arc::new(count_tx),
        }
    }

    /// How many connections the client has opened so far.
    pub fn open_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// The probe for the `index`-th connection, if it exists yet.
    pub fn link(&self, index: usize) -> Option<FakeLink> {
        self.links.lock().unwrap().get(index).cloned()
    }

    /// Wait until the client opens its `index`-th connection.
    pub async fn wait_for_link(&self, index: usize) -> FakeLink {
        let mut count_rx = self.count_tx.subscribe();
        loop {
            if let Some(link) = self.link(index) {
                return link;
            }
            count_rx
                .changed()
                .await
                .expect("fake transport dropped while waiting for a link");
        }
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: &str) -> TransportHandle {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let open = Arc::new(Mutex::new(false));
        let closed = Arc::new(Mutex::new(false));

        let probe = FakeLink {
            url: url.to_string(),
            sent: sent.clone(),
            event_tx: event_tx.clone(),
            open: open.clone(),
            closed: closed.clone(),
        };
        let handle = FakeLinkHandle {
            sent,
            event_tx,
            open,
            closed,
        };

        let mut links = self.links.lock().unwrap();
        links.push(probe);
        let _ = self.count_tx.send(links.len());
        (Box::new(handle), event_rx)
    }
}

/// A client wired to a fresh fake transport.
pub fn test_client(config: RealtimeConfig) -> (RealtimeClient, FakeTransport) {
    test_client_with_handlers(config, StatusHandlers::default())
}

pub fn test_client_with_handlers(
    config: RealtimeConfig,
    handlers: StatusHandlers,
) -> (RealtimeClient, FakeTransport) {
    let transport = FakeTransport::new();
    let client = RealtimeClient::with_transport(
        "ws://pool.test",
        config,
        handlers,
        Box::new(transport.clone()),
    );
    (client, transport)
}

/// Reconnect tuning that keeps virtual-time waits short and deterministic.
pub fn fast_config() -> RealtimeConfig {
    RealtimeConfig::default()
        .with_base_delay_ms(50)
        .with_jitter_ms(0)
        .with_max_delay_ms(1_000)
}

/// Channel names from the sent frames matching `action`.
pub fn frames_for(link: &FakeLink, action: &str) -> Vec<String> {
    link.sent_frames()
        .iter()
        .filter_map(|raw| {
            let value: Value = serde_json::from_str(raw).ok()?;
            if value["action"] == action {
                Some(value["channel"].as_str().unwrap_or_default().to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Let the client task work through everything already queued. Time only
/// advances on the paused clock once every task is idle, so when this
/// returns the client has processed all pending commands and events.
pub async fn drain() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
