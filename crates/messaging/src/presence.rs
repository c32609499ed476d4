//! Process-wide presence registry.
//!
//! Maps a party id to at most one live connection. All mutation goes through
//! `mark_online`/`mark_offline`/`touch`; connection-handling tasks never see
//! the map itself. State is purely in-memory and torn down with the process.

use crate::events::DeliveryEvent;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tradepost_database::{MessagingError, MessagingResult};
use uuid::Uuid;

/// One live client connection: an id to disambiguate reconnect races and a
/// channel on which delivery events are forwarded to the socket task.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub party_id: i64,
    sender: mpsc::UnboundedSender<DeliveryEvent>,
}

impl ConnectionHandle {
    pub(crate) fn new(party_id: i64, sender: mpsc::UnboundedSender<DeliveryEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            party_id,
            sender,
        }
    }

    /// Push an event towards the connection's socket task. Fails only when
    /// the receiving task has already gone away.
    pub fn push(&self, event: DeliveryEvent) -> MessagingResult<()> {
        self.sender
            .send(event)
            .map_err(|_| MessagingError::Transport(format!("connection {} is closed", self.id)))
    }
}

struct PresenceEntry {
    handle: ConnectionHandle,
    last_seen: DateTime<Utc>,
}

pub struct PresenceRegistry {
    entries: RwLock<HashMap<i64, PresenceEntry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection for its party, replacing any previous entry
    /// (last connect wins under reconnect storms). Returns the other
    /// currently-registered connections so the caller can broadcast the
    /// presence change.
    pub async fn mark_online(&self, handle: ConnectionHandle) -> Vec<ConnectionHandle> {
        let mut entries = self.entries.write().await;
        let party_id = handle.party_id;
        entries.insert(
            party_id,
            PresenceEntry {
                handle,
                last_seen: Utc::now(),
            },
        );

        entries
            .values()
            .filter(|entry| entry.handle.party_id != party_id)
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Remove the party's entry, but only if `connection_id` still matches:
    /// a stale disconnect racing a newer connect must not clear the newer
    /// entry. Returns the remaining connections for the offline broadcast,
    /// or `None` when the disconnect was stale or unknown.
    pub async fn mark_offline(
        &self,
        party_id: i64,
        connection_id: Uuid,
    ) -> Option<Vec<ConnectionHandle>> {
        let mut entries = self.entries.write().await;
        match entries.get(&party_id) {
            Some(entry) if entry.handle.id == connection_id => {
                entries.remove(&party_id);
                Some(entries.values().map(|entry| entry.handle.clone()).collect())
            }
            _ => None,
        }
    }

    pub async fn is_online(&self, party_id: i64) -> bool {
        self.entries.read().await.contains_key(&party_id)
    }

    pub async fn last_seen(&self, party_id: i64) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .await
            .get(&party_id)
            .map(|entry| entry.last_seen)
    }

    pub async fn handle_of(&self, party_id: i64) -> Option<ConnectionHandle> {
        self.entries
            .read()
            .await
            .get(&party_id)
            .map(|entry| entry.handle.clone())
    }

    pub async fn handles(&self) -> Vec<ConnectionHandle> {
        self.entries
            .read()
            .await
            .values()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Refresh the last-seen stamp for a live connection (driven by pings).
    pub async fn touch(&self, party_id: i64, connection_id: Uuid) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(&party_id) {
            if entry.handle.id == connection_id {
                entry.last_seen = Utc::now();
            }
        }
    }

    /// Server-initiated timeout: drop entries that have not been seen within
    /// `idle_for`. Returns the party ids that were removed.
    pub async fn prune_idle(&self, idle_for: Duration) -> Vec<i64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(idle_for).unwrap_or_else(|_| chrono::Duration::zero());

        let mut entries = self.entries.write().await;
        let expired: Vec<i64> = entries
            .iter()
            .filter(|(_, entry)| entry.last_seen < cutoff)
            .map(|(party_id, _)| *party_id)
            .collect();

        for party_id in &expired {
            entries.remove(party_id);
        }
        expired
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
