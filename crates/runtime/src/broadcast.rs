use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;
use tokio::sync::{mpsc, RwLock};

use keeper_common::get_current_timestamp;

/// Buffer size for each subscriber's event channel. A subscriber that falls
/// this far behind starts losing events; delivery is at-most-once.
pub const EVENT_CHANNEL_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CharacterUpdated,
    EffectApplied,
    RollResult,
    ProjectionUpdate,
}

/// Wire envelope pushed to every subscriber of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: serde_json::Value,
    pub timestamp: i64,
}

impl SessionEvent {
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            data,
            timestamp: get_current_timestamp(),
        }
    }

    pub fn character_updated(data: serde_json::Value) -> Self {
        Self::new(EventKind::CharacterUpdated, data)
    }

    pub fn effect_applied(data: serde_json::Value) -> Self {
        Self::new(EventKind::EffectApplied, data)
    }

    pub fn roll_result(data: serde_json::Value) -> Self {
        Self::new(EventKind::RollResult, data)
    }

    pub fn projection_update(data: serde_json::Value) -> Self {
        Self::new(EventKind::ProjectionUpdate, data)
    }
}

/// Messages a connected client may send over the socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinSession {
        session_id: Uuid,
        user_id: Option<Uuid>,
    },
    LeaveSession,
    Ping,
    #[serde(other)]
    Unknown,
}

/// Per-session publish/subscribe fan-out. One registry is constructed at
/// startup and handed to request handlers; tests build their own isolated
/// instances.
///
/// Delivery is fire-and-forget: a full or closed subscriber channel drops
/// the event for that subscriber and never fails the publisher. There is no
/// replay; a reconnecting client must re-fetch state over HTTP.
#[derive(Debug, Default)]
pub struct BroadcastRegistry {
    sessions: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::Sender<SessionEvent>>>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `connection_id` to the session's subscriber set, returning the
    /// receiving half of its event channel. Re-subscribing under the same
    /// connection id replaces the previous channel.
    pub async fn subscribe(
        &self,
        session_id: Uuid,
        connection_id: Uuid,
    ) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id).or_default().insert(connection_id, tx);
        tracing::debug!(
            "[BroadcastRegistry::subscribe] connection {} joined session {}",
            connection_id,
            session_id
        );
        rx
    }

    /// Removes the subscriber and prunes the session entry once empty.
    pub async fn leave(&self, session_id: Uuid, connection_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        if let Some(subscribers) = sessions.get_mut(&session_id) {
            subscribers.remove(&connection_id);
            if subscribers.is_empty() {
                sessions.remove(&session_id);
            }
        }
    }

    /// Delivers `event` to every subscriber of `session_id`. Subscribers of
    /// other sessions never see it.
    pub async fn broadcast(&self, session_id: Uuid, event: SessionEvent) {
        let sessions = self.sessions.read().await;
        let Some(subscribers) = sessions.get(&session_id) else {
            return;
        };

        for (connection_id, tx) in subscribers {
            if tx.try_send(event.clone()).is_err() {
                tracing::debug!(
                    "[BroadcastRegistry::broadcast] dropped event for connection {}",
                    connection_id
                );
            }
        }
    }

    pub async fn subscriber_count(&self, session_id: Uuid) -> usize {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn events_reach_session_subscribers() {
        let registry = BroadcastRegistry::new();
        let session = Uuid::new_v4();
        let mut rx = registry.subscribe(session, Uuid::new_v4()).await;

        registry
            .broadcast(session, SessionEvent::roll_result(json!({"total": 42})))
            .await;

        let event = rx.try_recv().expect("subscriber should receive the event");
        assert_eq!(event.kind, EventKind::RollResult);
        assert_eq!(event.data["total"], 42);
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let registry = BroadcastRegistry::new();
        let session_x = Uuid::new_v4();
        let session_y = Uuid::new_v4();
        let mut rx_x = registry.subscribe(session_x, Uuid::new_v4()).await;

        registry
            .broadcast(session_y, SessionEvent::character_updated(json!({})))
            .await;

        assert!(rx_x.try_recv().is_err(), "session X must not see session Y events");
    }

    #[tokio::test]
    async fn leave_prunes_empty_sessions() {
        let registry = BroadcastRegistry::new();
        let session = Uuid::new_v4();
        let connection = Uuid::new_v4();
        let _rx = registry.subscribe(session, connection).await;
        assert_eq!(registry.subscriber_count(session).await, 1);

        registry.leave(session, connection).await;
        assert_eq!(registry.subscriber_count(session).await, 0);
        assert!(registry.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_to_dead_subscriber_is_swallowed() {
        let registry = BroadcastRegistry::new();
        let session = Uuid::new_v4();
        let rx = registry.subscribe(session, Uuid::new_v4()).await;
        drop(rx);

        // Must not panic or error out.
        registry
            .broadcast(session, SessionEvent::effect_applied(json!({})))
            .await;
    }

    #[test]
    fn event_envelope_wire_shape() {
        let event = SessionEvent::character_updated(json!({"id": "abc"}));
        let raw = serde_json::to_value(&event).unwrap();
        assert_eq!(raw["type"], "character_updated");
        assert_eq!(raw["data"]["id"], "abc");
        assert!(raw["timestamp"].is_i64());
    }

    #[test]
    fn client_join_message_parses() {
        let session_id = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"join_session","data":{{"sessionId":"{session_id}","userId":null}}}}"#
        );
        let message: ClientMessage = serde_json::from_str(&raw).unwrap();
        match message {
            ClientMessage::JoinSession { session_id: got, user_id } => {
                assert_eq!(got, session_id);
                assert!(user_id.is_none());
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn unknown_client_message_is_tolerated() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"dance"}"#).unwrap();
        assert!(matches!(message, ClientMessage::Unknown));
    }
}
