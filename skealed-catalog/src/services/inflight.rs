use std::time::Duration;

use uuid::Uuid;

use skealed_shared::clients::redis::RedisClient;
use skealed_shared::errors::{AppError, AppResult, ErrorCode};

#[derive(Debug, Clone, Copy)]
pub enum Action {
    SkillVote,
    IdeaVote,
    Favorite,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Self::SkillVote => "vote:skill",
            Self::IdeaVote => "vote:idea",
            Self::Favorite => "favorite",
        }
    }
}

pub fn guard_key(action: Action, user_id: Uuid, target_id: i32) -> String {
    format!("inflight:{}:{user_id}:{target_id}", action.as_str())
}

/// Marker that a mutation for (user, item) is running. Released explicitly;
/// the TTL clears keys left behind by a crashed request.
#[must_use]
pub struct InFlightGuard {
    key: Option<String>,
}

impl InFlightGuard {
    pub async fn acquire(
        redis: &RedisClient,
        action: Action,
        user_id: Uuid,
        target_id: i32,
        ttl_secs: u64,
    ) -> AppResult<Self> {
        let key = guard_key(action, user_id, target_id);

        match redis.claim(&key, Duration::from_secs(ttl_secs)).await {
            Ok(true) => Ok(Self { key: Some(key) }),
            Ok(false) => Err(AppError::new(
                ErrorCode::ActionInProgress,
                "still processing your last click on this item",
            )),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "in-flight guard unavailable, continuing without it");
                Ok(Self { key: None })
            }
        }
    }

    pub async fn release(self, redis: &RedisClient) {
        if let Some(key) = self.key {
            if let Err(e) = redis.release(&key).await {
                tracing::warn!(error = %e, key = %key, "failed to release in-flight guard");
            }
        }
    }
}
