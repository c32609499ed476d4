//! Relay WebSocket handler
//!
//! Each connection registers with the relay hub and forwards delivery events
//! to the client until the socket closes or the party reconnects elsewhere.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use tradepost_messaging::{ConnectionHandle, DeliveryEvent, MessagingError};

use crate::rest::message::MessageResponse;
use crate::state::GatewayState;

/// Client events received over the relay socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayClientEvent {
    /// Heartbeat to keep presence fresh
    Ping,
    /// Send a message into a conversation
    Send {
        conversation_id: String,
        text: Option<String>,
        image_url: Option<String>,
    },
}

/// Server events sent to relay clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayServerEvent {
    /// Welcome frame after the connection is registered
    Hello { party_id: i64 },
    /// Heartbeat response
    Pong,
    /// A send failed; the conversation is unchanged
    Error { error: String, message: String },
    /// A message was delivered to this party, or echoed back after a
    /// socket-initiated send
    Message {
        conversation_id: String,
        message: MessageResponse,
    },
    /// Another party's presence changed
    PresenceChanged {
        party_id: i64,
        online: bool,
        last_seen: i64,
    },
}

impl From<DeliveryEvent> for RelayServerEvent {
    fn from(event: DeliveryEvent) -> Self {
        match event {
            DeliveryEvent::Message {
                conversation_id,
                message,
            } => RelayServerEvent::Message {
                conversation_id,
                message: MessageResponse::from(&message),
            },
            DeliveryEvent::Presence {
                party_id,
                online,
                last_seen,
            } => RelayServerEvent::PresenceChanged {
                party_id,
                online,
                last_seen,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RelayQuery {
    party_id: i64,
}

/// Relay WebSocket connection handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<RelayQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_relay_socket(socket, state, query.party_id))
}

async fn handle_relay_socket(socket: WebSocket, state: Arc<GatewayState>, party_id: i64) {
    let (mut sink, mut stream) = socket.split();
    let (handle, mut events) = state.relay.connect(party_id).await;

    let hello = RelayServerEvent::Hello { party_id };
    if send_event(&mut sink, &hello).await.is_err() {
        state.relay.disconnect(party_id, handle.id).await;
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => {
                // The hub drops our sender when a newer connection for this
                // party replaces us.
                let Some(event) = event else { break };
                if send_event(&mut sink, &RelayServerEvent::from(event)).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if handle_client_frame(&text, &state, &handle, &mut sink).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        debug!(party_id, %error, "relay socket read failed");
                        break;
                    }
                }
            }
        }
    }

    state.relay.disconnect(party_id, handle.id).await;
}

async fn handle_client_frame(
    text: &str,
    state: &Arc<GatewayState>,
    handle: &ConnectionHandle,
    sink: &mut (impl SinkExt<WsMessage> + Unpin),
) -> Result<(), ()> {
    let event = match serde_json::from_str::<RelayClientEvent>(text) {
        Ok(event) => event,
        Err(error) => {
            warn!(party_id = handle.party_id, %error, "unparseable relay frame");
            let reply = RelayServerEvent::Error {
                error: "VALIDATION".to_string(),
                message: "unrecognised event".to_string(),
            };
            return send_event(sink, &reply).await;
        }
    };

    match event {
        RelayClientEvent::Ping => {
            state.relay.touch(handle.party_id, handle.id).await;
            send_event(sink, &RelayServerEvent::Pong).await
        }
        RelayClientEvent::Send {
            conversation_id,
            text,
            image_url,
        } => {
            let reply = match state
                .messaging
                .send(&conversation_id, handle.party_id, text, image_url)
                .await
            {
                Ok(message) => RelayServerEvent::Message {
                    conversation_id: message.conversation_public_id.clone(),
                    message: MessageResponse::from(&message),
                },
                Err(error) => RelayServerEvent::Error {
                    error: error_code(&error).to_string(),
                    message: error.to_string(),
                },
            };
            send_event(sink, &reply).await
        }
    }
}

fn error_code(error: &MessagingError) -> &'static str {
    match error {
        MessagingError::Validation(_) => "VALIDATION",
        MessagingError::Forbidden { .. } => "ACCESS_DENIED",
        MessagingError::NotFound(_) => "NOT_FOUND",
        MessagingError::Storage(_) => "STORAGE",
        MessagingError::Transport(_) => "TRANSPORT",
    }
}

async fn send_event(
    sink: &mut (impl SinkExt<WsMessage> + Unpin),
    event: &RelayServerEvent,
) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|_| ())?;
    sink.send(WsMessage::Text(text)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_use_the_tagged_wire_shape() {
        let event: RelayClientEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(event, RelayClientEvent::Ping));

        let event: RelayClientEvent = serde_json::from_str(
            r#"{"type":"send","conversation_id":"c1","text":"hi","image_url":null}"#,
        )
        .unwrap();
        match event {
            RelayClientEvent::Send {
                conversation_id,
                text,
                image_url,
            } => {
                assert_eq!(conversation_id, "c1");
                assert_eq!(text.as_deref(), Some("hi"));
                assert!(image_url.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn server_events_serialize_with_a_type_tag() {
        let json = serde_json::to_value(&RelayServerEvent::Hello { party_id: 7 }).unwrap();
        assert_eq!(json["type"], "hello");
        assert_eq!(json["party_id"], 7);

        let json = serde_json::to_value(&RelayServerEvent::PresenceChanged {
            party_id: 3,
            online: false,
            last_seen: 1_700_000_000_000i64,
        })
        .unwrap();
        assert_eq!(json["type"], "presence_changed");
        assert_eq!(json["online"], false);
    }

    #[test]
    fn delivery_events_map_onto_server_frames() {
        let event = DeliveryEvent::Presence {
            party_id: 5,
            online: true,
            last_seen: 42,
        };
        match RelayServerEvent::from(event) {
            RelayServerEvent::PresenceChanged {
                party_id, online, ..
            } => {
                assert_eq!(party_id, 5);
                assert!(online);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn error_codes_follow_the_failure_kind() {
        assert_eq!(
            error_code(&MessagingError::Validation("empty".into())),
            "VALIDATION"
        );
        assert_eq!(
            error_code(&MessagingError::Forbidden {
                party_id: 1,
                conversation_id: "c1".into()
            }),
            "ACCESS_DENIED"
        );
        assert_eq!(
            error_code(&MessagingError::NotFound("conversation".into())),
            "NOT_FOUND"
        );
    }
}
