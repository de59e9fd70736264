use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `skealed.{service}.{entity}.{action}`
/// Example: `skealed.catalog.skill.voted`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Auth events
    pub const AUTH_USER_REGISTERED: &str = "skealed.auth.user.registered";
    pub const AUTH_USER_DELETED: &str = "skealed.auth.user.deleted";

    // Catalog events
    pub const CATALOG_SKILL_VOTED: &str = "skealed.catalog.skill.voted";
    pub const CATALOG_FAVORITE_TOGGLED: &str = "skealed.catalog.favorite.toggled";
    pub const CATALOG_IDEA_CREATED: &str = "skealed.catalog.idea.created";
    pub const CATALOG_IDEA_DELETED: &str = "skealed.catalog.idea.deleted";
    pub const CATALOG_IDEA_VOTED: &str = "skealed.catalog.idea.voted";
    pub const CATALOG_AVATAR_UPDATED: &str = "skealed.catalog.profile.avatar_updated";
    pub const CATALOG_DRILL_COMPLETED: &str = "skealed.catalog.drill.completed";
}

pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserRegistered {
        pub credential_id: Uuid,
        pub email: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserDeleted {
        pub credential_id: Uuid,
        pub email: String,
    }

    /// `vote` is 1 or -1, absent when the vote was withdrawn.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SkillVoted {
        pub skill_id: i32,
        pub user_id: Uuid,
        pub vote: Option<i16>,
        pub votes: i32,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct IdeaVoted {
        pub idea_id: i32,
        pub user_id: Uuid,
        pub vote: Option<i16>,
        pub votes: i32,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FavoriteToggled {
        pub skill_id: i32,
        pub user_id: Uuid,
        pub favorited: bool,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct IdeaCreated {
        pub idea_id: i32,
        pub author_id: Uuid,
        pub title: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct IdeaDeleted {
        pub idea_id: i32,
        pub deleted_by: Uuid,
        pub by_admin: bool,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AvatarUpdated {
        pub user_id: Uuid,
        pub avatar_url: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DrillCompleted {
        pub slug: String,
        pub user_id: Option<Uuid>,
        pub score: u32,
        pub total: u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_payload_under_data() {
        let user_id = Uuid::new_v4();
        let event = Event::new(
            "skealed-catalog",
            routing_keys::CATALOG_SKILL_VOTED,
            payloads::SkillVoted { skill_id: 7, user_id, vote: None, votes: 12 },
        )
        .with_user(user_id);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "skealed.catalog.skill.voted");
        assert_eq!(json["data"]["skill_id"], 7);
        assert!(json["data"]["vote"].is_null());
        assert_eq!(json["user_id"], user_id.to_string());
    }

    #[test]
    fn deleted_event_parses_back() {
        let raw = serde_json::json!({
            "id": Uuid::now_v7(),
            "source": "skealed-auth",
            "event_type": routing_keys::AUTH_USER_DELETED,
            "timestamp": "2026-03-01T10:00:00Z",
            "user_id": null,
            "data": { "credential_id": Uuid::nil(), "email": "gone@example.com" }
        });
        let event: Event<payloads::UserDeleted> = serde_json::from_value(raw).unwrap();
        assert_eq!(event.data.email, "gone@example.com");
    }
}
