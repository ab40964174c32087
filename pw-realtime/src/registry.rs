//! Channel bookkeeping: which channels have local subscribers, which are
//! subscribed on the wire, and who gets each inbound event.
//!
//! The registry is pure bookkeeping. It never talks to the transport; it
//! reports which control frames are due as [`WireAction`]s and the connection
//! actor sends them. Wire state is optimistic: a channel counts as subscribed
//! the moment the frame is handed over, because the server sends no acks.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::subscription::SubscriptionId;

/// A control frame the registry wants on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WireAction {
    Subscribe(String),
    Unsubscribe(String),
}

impl WireAction {
    pub(crate) fn channel(&self) -> &str {
        match self {
            WireAction::Subscribe(c) | WireAction::Unsubscribe(c) => c,
        }
    }
}

struct SubscriberSlot {
    id: SubscriptionId,
    tx: mpsc::Sender<Value>,
}

#[derive(Default)]
struct ChannelEntry {
    wire_subscribed: bool,
    subscribers: Vec<SubscriberSlot>,
}

/// Registry of local subscribers keyed by channel name.
pub(crate) struct SubscriptionRegistry {
    channels: HashMap<String, ChannelEntry>,
    next_id: SubscriptionId,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            channels: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a subscriber for `channel`. Returns the new subscription id,
    /// the receiving half of its event queue, and a `Subscribe` action when
    /// this is the channel's first subscriber and the connection is open.
    pub(crate) fn add(
        &mut self,
        channel: &str,
        buffer: usize,
        connection_open: bool,
    ) -> (SubscriptionId, mpsc::Receiver<Value>, Option<WireAction>) {
        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = mpsc::channel(buffer);
        let entry = self.channels.entry(channel.to_string()).or_default();
        let first = entry.subscribers.is_empty();
        entry.subscribers.push(SubscriberSlot { id, tx });

        let action = if first && connection_open && !entry.wire_subscribed {
            entry.wire_subscribed = true;
            Some(WireAction::Subscribe(channel.to_string()))
        } else {
            None
        };
        (id, rx, action)
    }

    /// Drop the subscriber `id`. Returns an `Unsubscribe` action when that
    /// was the channel's last subscriber and the channel is on the wire.
    /// Unknown ids are ignored, so dropping a handle twice is harmless.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> Option<WireAction> {
        let channel = self
            .channels
            .iter()
            .find(|(_, entry)| entry.subscribers.iter().any(|s| s.id == id))
            .map(|(name, _)| name.clone())?;

        let entry = self.channels.get_mut(&channel)?;
        entry.subscribers.retain(|s| s.id != id);
        if !entry.subscribers.is_empty() {
            return None;
        }

        let was_wired = entry.wire_subscribed;
        self.channels.remove(&channel);
        was_wired.then(|| WireAction::Unsubscribe(channel))
    }

    /// Deliver `data` to every subscriber of `channel`. Returns how many
    /// queues accepted it. Full queues drop the event rather than stall the
    /// event loop; closed queues are cleaned up on the subscriber's remove.
    pub(crate) fn dispatch(&self, channel: &str, data: &Value) -> usize {
        let Some(entry) = self.channels.get(channel) else {
            trace!(channel, "event for channel with no subscribers");
            return 0;
        };

        let mut delivered = 0;
        for slot in &entry.subscribers {
            match slot.tx.try_send(data.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(channel, subscription = slot.id, "subscriber queue full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    trace!(channel, subscription = slot.id, "subscriber queue closed");
                }
            }
        }
        delivered
    }

    /// Mark every channel with subscribers as wire-subscribed and return the
    /// `Subscribe` frames due, sorted by channel name so replay order is
    /// stable across reconnects.
    pub(crate) fn flush_all(&mut self) -> Vec<WireAction> {
        let mut actions: Vec<WireAction> = self
            .channels
            .iter_mut()
            .filter(|(_, entry)| !entry.subscribers.is_empty())
            .map(|(name, entry)| {
                entry.wire_subscribed = true;
                WireAction::Subscribe(name.clone())
            })
            .collect();
        actions.sort_by(|a, b| a.channel().cmp(b.channel()));
        actions
    }

    /// Forget all wire state. Local subscribers are untouched; the next
    /// `flush_all` resubscribes every surviving channel.
    pub(crate) fn reset_wire_state(&mut self) {
        for entry in self.channels.values_mut() {
            entry.wire_subscribed = false;
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |e| e.subscribers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_subscriber_wires_channel() {
        let mut reg = SubscriptionRegistry::new();
        let (_, _rx1, action) = reg.add("mining", 8, true);
        assert_eq!(action, Some(WireAction::Subscribe("mining".into())));

        // second subscriber on the same channel sends nothing
        let (_, _rx2, action) = reg.add("mining", 8, true);
        assert_eq!(action, None);
        assert_eq!(reg.subscriber_count("mining"), 2);
    }

    #[test]
    fn test_add_while_disconnected_defers_wire_action() {
        let mut reg = SubscriptionRegistry::new();
        let (_, _rx, action) = reg.add("blocks", 8, false);
        assert_eq!(action, None);

        // the deferred channel is picked up by the next flush
        let actions = reg.flush_all();
        assert_eq!(actions, vec![WireAction::Subscribe("blocks".into())]);
    }

    #[test]
    fn test_last_remove_unwires_channel() {
        let mut reg = SubscriptionRegistry::new();
        let (a, _rx1, _) = reg.add("mining", 8, true);
        let (b, _rx2, _) = reg.add("mining", 8, true);

        assert_eq!(reg.remove(a), None);
        assert_eq!(reg.remove(b), Some(WireAction::Unsubscribe("mining".into())));
        assert_eq!(reg.subscriber_count("mining"), 0);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut reg = SubscriptionRegistry::new();
        let (id, _rx, _) = reg.add("mining", 8, true);
        assert!(reg.remove(id).is_some());
        assert_eq!(reg.remove(id), None);
    }

    #[test]
    fn test_remove_unwired_channel_sends_nothing() {
        let mut reg = SubscriptionRegistry::new();
        let (id, _rx, _) = reg.add("mining", 8, false);
        // never made it onto the wire, so no unsubscribe is due
        assert_eq!(reg.remove(id), None);
    }

    #[test]
    fn test_dispatch_respects_channel_isolation() {
        let mut reg = SubscriptionRegistry::new();
        let (_, mut mining_rx, _) = reg.add("mining", 8, true);
        let (_, mut blocks_rx, _) = reg.add("blocks", 8, true);

        let event = json!({"type": "share_submitted", "diff": 1000});
        assert_eq!(reg.dispatch("mining", &event), 1);

        assert_eq!(mining_rx.try_recv().ok(), Some(event));
        assert!(blocks_rx.try_recv().is_err());
    }

    #[test]
    fn test_dispatch_fans_out_to_all_subscribers() {
        let mut reg = SubscriptionRegistry::new();
        let (_, mut rx1, _) = reg.add("mining", 8, true);
        let (_, mut rx2, _) = reg.add("mining", 8, true);

        assert_eq!(reg.dispatch("mining", &json!(1)), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_dispatch_drops_when_queue_full() {
        let mut reg = SubscriptionRegistry::new();
        let (_, mut rx, _) = reg.add("mining", 1, true);

        assert_eq!(reg.dispatch("mining", &json!(1)), 1);
        assert_eq!(reg.dispatch("mining", &json!(2)), 0);

        assert_eq!(rx.try_recv().ok(), Some(json!(1)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_flush_all_is_sorted_and_marks_wired() {
        let mut reg = SubscriptionRegistry::new();
        let (_, _rx1, _) = reg.add("workers", 8, false);
        let (_, _rx2, _) = reg.add("blocks", 8, false);
        let (_, _rx3, _) = reg.add("mining", 8, false);

        let actions = reg.flush_all();
        assert_eq!(
            actions,
            vec![
                WireAction::Subscribe("blocks".into()),
                WireAction::Subscribe("mining".into()),
                WireAction::Subscribe("workers".into()),
            ]
        );
        // a flush always replays every live channel
        assert_eq!(reg.flush_all().len(), 3);
    }

    #[test]
    fn test_reset_then_flush_resubscribes() {
        let mut reg = SubscriptionRegistry::new();
        let (id, _rx1, _) = reg.add("mining", 8, true);
        let (_, _rx2, _) = reg.add("blocks", 8, true);

        reg.reset_wire_state();
        // removing while unwired must not emit an unsubscribe
        assert_eq!(reg.remove(id), None);

        let actions = reg.flush_all();
        assert_eq!(actions, vec![WireAction::Subscribe("blocks".into())]);
    }
}
