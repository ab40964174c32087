//! PoolWatch Realtime - multiplexed websocket client for live pool events.
//!
//! This crate provides the channel client that handles:
//! - One persistent websocket shared by any number of channel subscriptions
//! - Automatic reconnection with exponential backoff and jitter
//! - Subscription replay after every reconnect
//! - Reference-counted channel subscriptions with strict isolation
//! - Connection state observation via watch channels and status callbacks
//! - A transport seam so tests run without a network

pub mod backoff;
pub mod manager;
pub mod protocol;
pub mod status;
pub mod subscription;
pub mod transport;

mod registry;

// Re-export key types
pub use backoff::ReconnectPolicy;
pub use manager::RealtimeClient;
pub use protocol::{ControlFrame, EventFrame};
pub use status::{ConnectionError, ConnectionState, DisconnectReason, StatusHandlers};
pub use subscription::{Subscription, SubscriptionId};
pub use transport::{Transport, TransportEvent, TransportHandle, TransportLink, WsTransport};
