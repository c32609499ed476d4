//! Relay hub: the fan-out side of the live push channel.
//!
//! The hub owns the presence registry and is the only component that mutates
//! it. Pushes are fire-and-forget: a failed push is logged and swallowed,
//! because the message log is the durability mechanism and the transport
//! layer's disconnect notification will correct presence shortly after.

use crate::events::DeliveryEvent;
use crate::presence::{ConnectionHandle, PresenceRegistry};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tradepost_database::Message;
use uuid::Uuid;

pub struct RelayHub {
    registry: PresenceRegistry,
}

impl RelayHub {
    pub fn new() -> Self {
        Self {
            registry: PresenceRegistry::new(),
        }
    }

    pub fn registry(&self) -> &PresenceRegistry {
        &self.registry
    }

    /// Register a new live connection for `party_id` and broadcast the
    /// "online" presence change to everyone else. Returns the connection
    /// handle and the receiving end the socket task forwards to the client.
    pub async fn connect(
        &self,
        party_id: i64,
    ) -> (ConnectionHandle, mpsc::UnboundedReceiver<DeliveryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(party_id, tx);
        let others = self.registry.mark_online(handle.clone()).await;

        info!(party_id, connection_id = %handle.id, "party connected");

        let event = DeliveryEvent::Presence {
            party_id,
            online: true,
            last_seen: chrono::Utc::now().timestamp_millis(),
        };
        fan_out(&others, &event);

        (handle, rx)
    }

    /// Deregister a connection and broadcast "offline". A disconnect for a
    /// connection that has already been replaced by a newer one is ignored.
    pub async fn disconnect(&self, party_id: i64, connection_id: Uuid) {
        match self.registry.mark_offline(party_id, connection_id).await {
            Some(remaining) => {
                info!(party_id, %connection_id, "party disconnected");
                let event = DeliveryEvent::Presence {
                    party_id,
                    online: false,
                    last_seen: chrono::Utc::now().timestamp_millis(),
                };
                fan_out(&remaining, &event);
            }
            None => {
                debug!(party_id, %connection_id, "ignoring stale disconnect");
            }
        }
    }

    /// Push a freshly persisted message to its recipient, if online. Offline
    /// recipients get nothing: they will see the message on their next
    /// history fetch.
    pub async fn send_message_event(&self, recipient_id: i64, message: &Message) {
        let Some(handle) = self.registry.handle_of(recipient_id).await else {
            debug!(recipient_id, "recipient offline, message waits in the log");
            return;
        };

        let event = DeliveryEvent::Message {
            conversation_id: message.conversation_public_id.clone(),
            message: message.clone(),
        };

        if let Err(error) = handle.push(event) {
            // The connection dropped mid-flight; the next disconnect signal
            // will clear the presence entry.
            debug!(recipient_id, %error, "push failed mid-flight");
        }
    }

    pub async fn is_online(&self, party_id: i64) -> bool {
        self.registry.is_online(party_id).await
    }

    pub async fn touch(&self, party_id: i64, connection_id: Uuid) {
        self.registry.touch(party_id, connection_id).await;
    }

    /// Time out idle connections and broadcast their departure.
    pub async fn prune_idle(&self, idle_for: Duration) {
        let removed = self.registry.prune_idle(idle_for).await;
        if removed.is_empty() {
            return;
        }

        let remaining = self.registry.handles().await;
        let now = chrono::Utc::now().timestamp_millis();
        for party_id in removed {
            info!(party_id, "presence timed out");
            let event = DeliveryEvent::Presence {
                party_id,
                online: false,
                last_seen: now,
            };
            fan_out(&remaining, &event);
        }
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

fn fan_out(handles: &[ConnectionHandle], event: &DeliveryEvent) {
    for handle in handles {
        if let Err(error) = handle.push(event.clone()) {
            debug!(party_id = handle.party_id, %error, "presence broadcast skipped a dead connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message(sender_id: i64) -> Message {
        Message {
            id: 1,
            public_id: "m1".to_string(),
            conversation_id: 1,
            conversation_public_id: "c1".to_string(),
            sender_id,
            text: Some("hello".to_string()),
            image_url: None,
            created_at: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn connect_broadcasts_online_to_other_parties_only() {
        let hub = RelayHub::new();
        let (_a_handle, mut a_rx) = hub.connect(1).await;
        let (_b_handle, mut b_rx) = hub.connect(2).await;

        // A hears about B coming online; B joined last and hears nothing.
        match a_rx.recv().await.unwrap() {
            DeliveryEvent::Presence {
                party_id, online, ..
            } => {
                assert_eq!(party_id, 2);
                assert!(online);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_broadcasts_offline() {
        let hub = RelayHub::new();
        let (_a_handle, mut a_rx) = hub.connect(1).await;
        let (b_handle, _b_rx) = hub.connect(2).await;

        // Drain the online notification first.
        let _ = a_rx.recv().await.unwrap();

        hub.disconnect(2, b_handle.id).await;
        match a_rx.recv().await.unwrap() {
            DeliveryEvent::Presence {
                party_id, online, ..
            } => {
                assert_eq!(party_id, 2);
                assert!(!online);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stale_disconnect_after_reconnect_keeps_party_online() {
        let hub = RelayHub::new();
        let (old_handle, _old_rx) = hub.connect(1).await;
        let (_new_handle, _new_rx) = hub.connect(1).await;

        hub.disconnect(1, old_handle.id).await;
        assert!(hub.is_online(1).await);
    }

    #[tokio::test]
    async fn message_event_reaches_an_online_recipient() {
        let hub = RelayHub::new();
        let (_handle, mut rx) = hub.connect(2).await;

        let message = sample_message(1);
        hub.send_message_event(2, &message).await;

        match rx.recv().await.unwrap() {
            DeliveryEvent::Message {
                conversation_id,
                message: delivered,
            } => {
                assert_eq!(conversation_id, "c1");
                assert_eq!(delivered, message);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn message_event_for_offline_recipient_is_dropped() {
        let hub = RelayHub::new();
        let message = sample_message(1);
        // No panic, no queueing: the call is simply a no-op.
        hub.send_message_event(2, &message).await;
        assert!(!hub.is_online(2).await);
    }

    #[tokio::test]
    async fn push_to_dropped_receiver_is_swallowed() {
        let hub = RelayHub::new();
        let (_handle, rx) = hub.connect(2).await;
        drop(rx);

        let message = sample_message(1);
        hub.send_message_event(2, &message).await;
        // Presence is left as-is; the disconnect signal cleans it up later.
        assert!(hub.is_online(2).await);
    }

    #[tokio::test]
    async fn prune_idle_notifies_remaining_parties() {
        let hub = RelayHub::new();
        let (_a_handle, _a_rx) = hub.connect(1).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        let (b_handle, mut b_rx) = hub.connect(2).await;
        hub.touch(2, b_handle.id).await;

        hub.prune_idle(Duration::from_millis(20)).await;

        assert!(!hub.is_online(1).await);
        assert!(hub.is_online(2).await);
        match b_rx.recv().await.unwrap() {
            DeliveryEvent::Presence {
                party_id, online, ..
            } => {
                assert_eq!(party_id, 1);
                assert!(!online);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
