//! Subscriber-side handle for one channel subscription.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::manager::Cmd;

/// Identifies one subscription for the lifetime of its client.
pub type SubscriptionId = u64;

/// A live subscription to one channel.
///
/// Events arrive in the order the server sent them. Dropping the handle (or
/// calling [`unsubscribe`](Subscription::unsubscribe)) releases the
/// subscription; when it was the channel's last one the client tells the
/// server to stop sending.
pub struct Subscription {
    id: SubscriptionId,
    channel: String,
    rx: mpsc::Receiver<Value>,
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    released: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        channel: String,
        rx: mpsc::Receiver<Value>,
        cmd_tx: mpsc::UnboundedSender<Cmd>,
    ) -> Self {
        Self {
            id,
            channel,
            rx,
            cmd_tx,
            released: false,
        }
    }

    /// The channel this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. Returns `None` once the subscription is
    /// released or the client shuts down, after any queued events.
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Take the next event without waiting, if one is queued.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.rx.try_recv().ok()
    }

    /// Release the subscription explicitly. Equivalent to dropping the
    /// handle, just more legible at call sites.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // client already gone means nothing to release
        let _ = self.cmd_tx.send(Cmd::Unsubscribe { id: self.id });
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish()
    }
}
