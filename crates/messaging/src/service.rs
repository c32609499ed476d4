//! Messaging service: the single write path for conversations.
//!
//! Every send goes persist-first: the message log append and the
//! conversation store's last-message update must both succeed before any
//! delivery event is emitted, so a recipient is never notified of a message
//! that failed to persist.

use crate::relay::RelayHub;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;
use tradepost_database::{
    Conversation, ConversationRepository, Message, MessageRepository, MessagingError,
    MessagingResult, NewMessage, Party, PartyRepository, PHOTO_MARKER,
};

/// A conversation as shown in a party's inbox: the dialogue itself plus the
/// other member and their live presence.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub peer: Party,
    pub peer_online: bool,
}

pub struct MessagingService {
    conversations: ConversationRepository,
    messages: MessageRepository,
    parties: PartyRepository,
    relay: Arc<RelayHub>,
    // Appends within one conversation are serialised; different
    // conversations proceed independently.
    append_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl MessagingService {
    pub fn new(pool: SqlitePool, relay: Arc<RelayHub>) -> Self {
        Self {
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            parties: PartyRepository::new(pool),
            relay,
            append_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Persist a message and notify its recipient if they are online.
    ///
    /// Validation failures have no side effect. The returned message is the
    /// sender's local echo; the relay never echoes back to the sender.
    pub async fn send(
        &self,
        conversation_public_id: &str,
        sender_id: i64,
        text: Option<String>,
        image_url: Option<String>,
    ) -> MessagingResult<Message> {
        let conversation = self.resolve(conversation_public_id).await?;

        let recipient_id =
            conversation
                .peer_of(sender_id)
                .ok_or_else(|| MessagingError::Forbidden {
                    party_id: sender_id,
                    conversation_id: conversation_public_id.to_string(),
                })?;

        let text = text
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let image_url = image_url.filter(|value| !value.is_empty());

        if text.is_none() && image_url.is_none() {
            return Err(MessagingError::Validation(
                "message must contain text or an image".to_string(),
            ));
        }

        let lock = self.append_lock(conversation.id).await;
        let message = {
            let _guard = lock.lock().await;

            let message = self
                .messages
                .append(
                    &conversation,
                    &NewMessage {
                        sender_id,
                        text,
                        image_url,
                    },
                )
                .await?;

            // Image-only messages show up as a sentinel in list views.
            let last_text = message.text.as_deref().unwrap_or(PHOTO_MARKER);
            self.conversations
                .record_last_message(conversation.id, last_text, sender_id)
                .await?;

            message
        };

        self.relay.send_message_event(recipient_id, &message).await;

        Ok(message)
    }

    /// Full message history of a conversation, oldest first.
    pub async fn history(
        &self,
        conversation_public_id: &str,
        party_id: i64,
    ) -> MessagingResult<Vec<Message>> {
        let conversation = self.resolve(conversation_public_id).await?;

        if !conversation.is_member(party_id) {
            return Err(MessagingError::Forbidden {
                party_id,
                conversation_id: conversation_public_id.to_string(),
            });
        }

        self.messages.list(&conversation).await
    }

    /// A party's inbox, most recently active first, with live presence for
    /// each peer.
    pub async fn conversations_for(
        &self,
        party_id: i64,
    ) -> MessagingResult<Vec<ConversationSummary>> {
        let conversations = self.conversations.find_for_party(party_id).await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let Some(peer_id) = conversation.peer_of(party_id) else {
                continue;
            };

            let Some(peer) = self.parties.find_by_id(peer_id).await? else {
                warn!(
                    conversation_id = conversation.id,
                    peer_id, "conversation references a missing party"
                );
                continue;
            };

            let peer_online = self.relay.is_online(peer_id).await;
            summaries.push(ConversationSummary {
                conversation,
                peer,
                peer_online,
            });
        }

        Ok(summaries)
    }

    async fn resolve(&self, conversation_public_id: &str) -> MessagingResult<Conversation> {
        self.conversations
            .find_by_public_id(conversation_public_id)
            .await?
            .ok_or_else(|| {
                MessagingError::NotFound(format!("conversation {conversation_public_id}"))
            })
    }

    async fn append_lock(&self, conversation_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.append_locks.lock().await;
        locks
            .entry(conversation_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DeliveryEvent;
    use tempfile::TempDir;
    use tradepost_config::DatabaseConfig;
    use tradepost_database::{initialize_database, prepare_database, run_migrations};

    struct TestSetup {
        service: MessagingService,
        relay: Arc<RelayHub>,
        conversation: Conversation,
        buyer_id: i64,
        seller_id: i64,
        outsider_id: i64,
        _temp_dir: TempDir,
    }

    async fn create_test_setup() -> TestSetup {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_service.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 5,
        };

        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let parties = PartyRepository::new(pool.clone());
        let buyer = parties.create("buyer", None).await.unwrap();
        let seller = parties.create("seller", None).await.unwrap();
        let outsider = parties.create("outsider", None).await.unwrap();

        let conversations = ConversationRepository::new(pool.clone());
        let conversation = conversations.create(buyer.id, seller.id).await.unwrap();

        let relay = Arc::new(RelayHub::new());
        let service = MessagingService::new(pool, relay.clone());

        TestSetup {
            service,
            relay,
            conversation,
            buyer_id: buyer.id,
            seller_id: seller.id,
            outsider_id: outsider.id,
            _temp_dir: temp_dir,
        }
    }

    #[tokio::test]
    async fn offline_send_is_visible_on_next_fetch() {
        let setup = create_test_setup().await;

        // Seller is offline; the append must still succeed.
        let sent = setup
            .service
            .send(
                &setup.conversation.public_id,
                setup.buyer_id,
                Some("hi".to_string()),
                None,
            )
            .await
            .unwrap();

        let history = setup
            .service
            .history(&setup.conversation.public_id, setup.seller_id)
            .await
            .unwrap();

        assert_eq!(history, vec![sent]);
    }

    #[tokio::test]
    async fn online_recipient_receives_the_stored_message() {
        let setup = create_test_setup().await;
        let (_handle, mut rx) = setup.relay.connect(setup.seller_id).await;

        let sent = setup
            .service
            .send(
                &setup.conversation.public_id,
                setup.buyer_id,
                Some("hello".to_string()),
                None,
            )
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            DeliveryEvent::Message {
                conversation_id,
                message,
            } => {
                assert_eq!(conversation_id, setup.conversation.public_id);
                assert_eq!(message, sent);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sender_gets_no_echo_over_the_relay() {
        let setup = create_test_setup().await;
        let (_handle, mut rx) = setup.relay.connect(setup.buyer_id).await;

        setup
            .service
            .send(
                &setup.conversation.public_id,
                setup.buyer_id,
                Some("hello".to_string()),
                None,
            )
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_send_fails_validation_without_side_effects() {
        let setup = create_test_setup().await;

        let err = setup
            .service
            .send(&setup.conversation.public_id, setup.buyer_id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Validation(_)));

        // Whitespace-only text counts as empty.
        let err = setup
            .service
            .send(
                &setup.conversation.public_id,
                setup.buyer_id,
                Some("   ".to_string()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Validation(_)));

        let history = setup
            .service
            .history(&setup.conversation.public_id, setup.buyer_id)
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn non_member_send_is_forbidden_and_emits_nothing() {
        let setup = create_test_setup().await;
        let (_b_handle, mut buyer_rx) = setup.relay.connect(setup.buyer_id).await;
        let (_s_handle, mut seller_rx) = setup.relay.connect(setup.seller_id).await;

        // Drain the seller's online notification to the buyer.
        let _ = buyer_rx.recv().await.unwrap();

        let err = setup
            .service
            .send(
                &setup.conversation.public_id,
                setup.outsider_id,
                Some("let me in".to_string()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Forbidden { .. }));

        let history = setup
            .service
            .history(&setup.conversation.public_id, setup.buyer_id)
            .await
            .unwrap();
        assert!(history.is_empty());

        assert!(buyer_rx.try_recv().is_err());
        assert!(seller_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_conversation_is_not_found() {
        let setup = create_test_setup().await;

        let err = setup
            .service
            .send(
                "missing",
                setup.buyer_id,
                Some("anyone there?".to_string()),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::NotFound(_)));
    }

    #[tokio::test]
    async fn history_requires_membership() {
        let setup = create_test_setup().await;

        let err = setup
            .service
            .history(&setup.conversation.public_id, setup.outsider_id)
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn image_only_send_records_the_photo_marker() {
        let setup = create_test_setup().await;

        setup
            .service
            .send(
                &setup.conversation.public_id,
                setup.seller_id,
                None,
                Some("https://cdn/listing.jpg".to_string()),
            )
            .await
            .unwrap();

        let summaries = setup
            .service
            .conversations_for(setup.buyer_id)
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(
            summaries[0].conversation.last_message_text.as_deref(),
            Some(PHOTO_MARKER)
        );
        assert_eq!(
            summaries[0].conversation.last_sender_id,
            Some(setup.seller_id)
        );
    }

    #[tokio::test]
    async fn inbox_reflects_peer_presence() {
        let setup = create_test_setup().await;

        let summaries = setup
            .service
            .conversations_for(setup.buyer_id)
            .await
            .unwrap();
        assert!(!summaries[0].peer_online);

        let (_handle, _rx) = setup.relay.connect(setup.seller_id).await;
        let summaries = setup
            .service
            .conversations_for(setup.buyer_id)
            .await
            .unwrap();
        assert!(summaries[0].peer_online);
        assert_eq!(summaries[0].peer.display_name, "seller");
    }

    #[tokio::test]
    async fn appends_keep_creation_order_across_senders() {
        let setup = create_test_setup().await;

        let first = setup
            .service
            .send(
                &setup.conversation.public_id,
                setup.buyer_id,
                Some("one".to_string()),
                None,
            )
            .await
            .unwrap();
        let second = setup
            .service
            .send(
                &setup.conversation.public_id,
                setup.seller_id,
                Some("two".to_string()),
                None,
            )
            .await
            .unwrap();

        let history = setup
            .service
            .history(&setup.conversation.public_id, setup.buyer_id)
            .await
            .unwrap();
        assert_eq!(history, vec![first.clone(), second.clone()]);
        assert!(first.created_at <= second.created_at);
    }

    #[tokio::test]
    async fn initialize_database_helper_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("init.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();
        let relay = Arc::new(RelayHub::new());
        let service = MessagingService::new(pool, relay);

        assert!(service.conversations_for(1).await.unwrap().is_empty());
    }
}
