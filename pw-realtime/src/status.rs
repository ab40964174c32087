//! Connection status observation.
//!
//! The client publishes its [`ConnectionState`] on a watch channel and can
//! additionally invoke optional callbacks on connect, disconnect, and error.
//! Both mechanisms are passive; nothing here ever fails a caller.

use std::fmt;
use std::sync::Arc;

/// Lifecycle state of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection and nothing scheduled. Also the terminal state after
    /// `disconnect()` or after the reconnect budget is exhausted.
    Disconnected,
    /// First connection attempt in flight.
    Connecting,
    /// Connection established; subscriptions are live.
    Open,
    /// Connection lost; waiting out a backoff delay or retrying.
    Reconnecting,
    /// Shutdown requested; transport close in flight.
    Closing,
}

impl ConnectionState {
    /// Whether events can currently flow.
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Open => "Open",
            ConnectionState::Reconnecting => "Reconnecting",
            ConnectionState::Closing => "Closing",
        };
        write!(f, "{s}")
    }
}

/// Why an established connection went away.
#[derive(Debug, Clone)]
pub struct DisconnectReason {
    /// Human-readable description.
    pub message: String,
    /// Close code supplied by the peer, when there was one.
    pub code: Option<u16>,
}

/// A connection-level failure surfaced through the status callbacks.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    /// Human-readable description.
    pub message: String,
    /// False once the reconnect budget is exhausted; the client is then at
    /// rest until `connect()` is called again.
    pub recoverable: bool,
}

type ConnectFn = Arc<dyn Fn() + Send + Sync>;
type DisconnectFn = Arc<dyn Fn(DisconnectReason) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(ConnectionError) + Send + Sync>;

/// Optional callbacks observing connection transitions.
///
/// Callbacks run on the client's internal task; keep them short and do not
/// block. All of them default to no-ops.
#[derive(Clone, Default)]
pub struct StatusHandlers {
    on_connect: Option<ConnectFn>,
    on_disconnect: Option<DisconnectFn>,
    on_error: Option<ErrorFn>,
}

impl StatusHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called every time a connection reaches open, including reconnects.
    pub fn on_connect(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(callback));
        self
    }

    /// Called when an established connection is lost.
    pub fn on_disconnect(
        mut self,
        callback: impl Fn(DisconnectReason) + Send + Sync + 'static,
    ) -> Self {
        self.on_disconnect = Some(Arc::new(callback));
        self
    }

    /// Called on transport failures and on terminal exhaustion.
    pub fn on_error(
        mut self,
        callback: impl Fn(ConnectionError) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub(crate) fn emit_connect(&self) {
        if let Some(callback) = &self.on_connect {
            callback();
        }
    }

    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(callback) = &self.on_disconnect {
            callback(reason);
        }
    }

    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(callback) = &self.on_error {
            callback(error);
        }
    }
}

impl fmt::Debug for StatusHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
