use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionChange {
    SignedIn,
    TokenRefreshed,
    SignedOut,
    UserDeleted,
}

impl SessionChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignedIn => "signed_in",
            Self::TokenRefreshed => "token_refreshed",
            Self::SignedOut => "signed_out",
            Self::UserDeleted => "user_deleted",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub change: SessionChange,
    pub at: DateTime<Utc>,
}

/// In-process fan-out of session changes to connected SSE clients.
#[derive(Clone)]
pub struct SessionBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, user_id: Uuid, change: SessionChange) {
        let event = SessionEvent {
            id: Uuid::now_v7(),
            user_id,
            change,
            at: Utc::now(),
        };
        // No subscribers is the common case.
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(user_id = %user_id, change = change.as_str(), delivered, "session change published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_changes() {
        let bus = SessionBus::new();
        let mut rx = bus.subscribe();
        let user = Uuid::new_v4();

        bus.publish(user, SessionChange::SignedIn);
        bus.publish(user, SessionChange::SignedOut);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.user_id, user);
        assert_eq!(first.change, SessionChange::SignedIn);
        assert_eq!(second.change, SessionChange::SignedOut);
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        SessionBus::new().publish(Uuid::new_v4(), SessionChange::TokenRefreshed);
    }

    #[test]
    fn change_serializes_snake_case() {
        let json = serde_json::to_value(SessionChange::UserDeleted).unwrap();
        assert_eq!(json, "user_deleted");
        assert_eq!(SessionChange::UserDeleted.as_str(), "user_deleted");
    }
}
