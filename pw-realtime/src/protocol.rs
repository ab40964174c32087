//! Wire envelopes for the realtime feed.
//!
//! Two frame shapes cross the socket: outbound control commands
//! (`{"action":"subscribe","channel":"mining"}`) and inbound events
//! (`{"channel":"mining","data":...}`). Payloads stay opaque
//! `serde_json::Value`s; interpreting them is the subscriber's business.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use pw_core::error::PwResult;

/// Outbound control command for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ControlFrame {
    /// Start receiving events for a channel.
    Subscribe { channel: String },
    /// Stop receiving events for a channel.
    Unsubscribe { channel: String },
}

impl ControlFrame {
    pub fn subscribe(channel: impl Into<String>) -> Self {
        ControlFrame::Subscribe { channel: channel.into() }
    }

    pub fn unsubscribe(channel: impl Into<String>) -> Self {
        ControlFrame::Unsubscribe { channel: channel.into() }
    }

    /// Channel this command targets.
    pub fn channel(&self) -> &str {
        match self {
            ControlFrame::Subscribe { channel } => channel,
            ControlFrame::Unsubscribe { channel } => channel,
        }
    }

    /// Encode for the wire.
    pub fn to_json(&self) -> PwResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Inbound message envelope.
///
/// Only `data` is ever handed to subscribers; the envelope itself stays
/// inside the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// Channel the event belongs to.
    pub channel: String,
    /// Opaque payload forwarded to subscribers verbatim.
    pub data: Value,
}

/// Parse an inbound text frame.
///
/// Returns `None` for anything that does not match the envelope shape.
/// Malformed frames are a data-quality issue, not a connection issue, so
/// they are dropped with a debug log and nothing else changes.
pub fn parse_event(raw: &str) -> Option<EventFrame> {
    match serde_json::from_str::<EventFrame>(raw) {
        Ok(frame) => Some(frame),
        Err(e) => {
            debug!(error = %e, "dropping malformed inbound frame");
            None
        }
    }
}
