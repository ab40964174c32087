//! Transport seam: the only code that touches the network.
//!
//! A [`Transport`] turns a URL into one physical connection attempt: an
//! outbound [`TransportLink`] plus a stream of [`TransportEvent`]s. The
//! production implementation is [`WsTransport`] (tokio-tungstenite); tests
//! drive the client with an in-memory fake implementing the same traits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, trace};

use pw_core::constants;
use pw_core::error::{PwError, PwResult};

/// Events a link pushes to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection finished opening; `send` is accepted from now on.
    Opened,
    /// A complete inbound text frame.
    Message(String),
    /// The link is gone. Always the final event for a link, whatever came
    /// before; carries the peer's close code when one was supplied.
    Closed(Option<u16>),
    /// A transport-level failure. A `Closed` event follows.
    Errored(String),
}

/// One physical connection attempt: the outbound handle and the event stream
/// reporting what happens to it.
pub type TransportHandle = (Box<dyn TransportLink>, mpsc::UnboundedReceiver<TransportEvent>);

/// Factory for physical connections.
pub trait Transport: Send + Sync + 'static {
    /// Begin opening a connection to `url`. Never blocks; the outcome is
    /// reported as `Opened` or `Closed` on the returned event stream.
    fn open(&self, url: &str) -> TransportHandle;
}

/// Outbound half of one physical connection.
pub trait TransportLink: Send {
    /// Queue a text frame for sending. Rejected while the link is not open;
    /// the caller decides whether to buffer and retry later.
    fn send(&self, frame: String) -> PwResult<()>;

    /// Request shutdown. A `Closed` event always follows on the event
    /// stream, even if the link never opened.
    fn close(&self);
}

/// Websocket transport backed by tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(constants::DEFAULT_CONNECT_TIMEOUT_MS))
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str) -> TransportHandle {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let close = Arc::new(Notify::new());

        let link = WsLink {
            out_tx,
            open: open.clone(),
            close: close.clone(),
        };
        tokio::spawn(run_socket(
            url.to_string(),
            self.connect_timeout,
            event_tx,
            out_rx,
            open,
            close,
        ));
        (Box::new(link), event_rx)
    }
}

struct WsLink {
    out_tx: mpsc::UnboundedSender<String>,
    open: Arc<AtomicBool>,
    close: Arc<Notify>,
}

impl TransportLink for WsLink {
    fn send(&self, frame: String) -> PwResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(PwError::NotConnected);
        }
        self.out_tx.send(frame).map_err(|_| PwError::NotConnected)
    }

    fn close(&self) {
        // reject sends immediately; the socket task winds down async
        self.open.store(false, Ordering::SeqCst);
        self.close.notify_one();
    }
}

/// Socket task: one per connection attempt. Owns the websocket for its whole
/// life and always finishes by emitting `Closed`.
async fn run_socket(
    url: String,
    connect_timeout: Duration,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    open: Arc<AtomicBool>,
    close: Arc<Notify>,
) {
    let mut ws = tokio::select! {
        result = tokio::time::timeout(connect_timeout, connect_async(url.as_str())) => {
            match result {
                Ok(Ok((ws, response))) => {
                    trace!(status = %response.status(), "websocket handshake complete");
                    ws
                }
                Ok(Err(e)) => {
                    let _ = event_tx.send(TransportEvent::Errored(e.to_string()));
                    let _ = event_tx.send(TransportEvent::Closed(None));
                    return;
                }
                Err(_) => {
                    let _ = event_tx.send(TransportEvent::Errored(format!(
                        "handshake timed out after {}ms",
                        connect_timeout.as_millis()
                    )));
                    let _ = event_tx.send(TransportEvent::Closed(None));
                    return;
                }
            }
        }
        _ = close.notified() => {
            debug!("close requested while connecting");
            let _ = event_tx.send(TransportEvent::Closed(None));
            return;
        }
    };

    open.store(true, Ordering::SeqCst);
    let _ = event_tx.send(TransportEvent::Opened);

    let close_code: Option<u16> = loop {
        tokio::select! {
            biased;
            _ = close.notified() => {
                let _ = ws.close(None).await;
                break None;
            }
            frame = out_rx.recv() => match frame {
                Some(text) => {
                    if let Err(e) = ws.send(Message::Text(text)).await {
                        let _ = event_tx.send(TransportEvent::Errored(e.to_string()));
                        break None;
                    }
                }
                // all senders dropped, the owner abandoned this link
                None => {
                    let _ = ws.close(None).await;
                    break None;
                }
            },
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = event_tx.send(TransportEvent::Message(text));
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = ws.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| u16::from(f.code));
                }
                Some(Ok(_)) => {
                    // binary and pong frames are not part of the feed
                }
                Some(Err(e)) => {
                    let _ = event_tx.send(TransportEvent::Errored(e.to_string()));
                    break None;
                }
                None => break None,
            },
        }
    };

    open.store(false, Ordering::SeqCst);
    let _ = event_tx.send(TransportEvent::Closed(close_code));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_connect_emits_errored_then_closed() {
        // nothing listens on this port; the handshake fails fast
        let transport = WsTransport::new(Duration::from_secs(5));
        let (link, mut events) = transport.open("ws://127.0.0.1:1/ws?token=t");

        assert!(matches!(events.recv().await, Some(TransportEvent::Errored(_))));
        assert_eq!(events.recv().await, Some(TransportEvent::Closed(None)));
        assert!(matches!(link.send("hello".into()), Err(PwError::NotConnected)));
    }

    #[tokio::test]
    async fn test_close_before_open_still_ends_with_closed() {
        let transport = WsTransport::new(Duration::from_secs(30));
        // RFC 5737 TEST-NET address; whether the connect hangs or fails
        // outright, close() must still terminate the stream with Closed
        let (link, mut events) = transport.open("ws://192.0.2.1:9/ws");
        link.close();

        let mut last = None;
        while let Some(event) = events.recv().await {
            last = Some(event);
        }
        assert_eq!(last, Some(TransportEvent::Closed(None)));
    }

    #[tokio::test]
    async fn test_send_rejected_before_open() {
        let transport = WsTransport::default();
        let (link, _events) = transport.open("ws://192.0.2.1:9/ws");
        assert!(matches!(link.send("early".into()), Err(PwError::NotConnected)));
        link.close();
    }
}
