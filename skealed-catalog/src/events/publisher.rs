use serde::Serialize;
use uuid::Uuid;

use skealed_shared::clients::rabbitmq::RabbitMQClient;
use skealed_shared::types::event::{payloads, routing_keys, Event};

const SOURCE: &str = "skealed-catalog";

async fn publish<T: Serialize>(rabbitmq: &RabbitMQClient, routing_key: &str, user_id: Option<Uuid>, data: T) {
    let mut event = Event::new(SOURCE, routing_key, data);
    if let Some(user_id) = user_id {
        event = event.with_user(user_id);
    }

    if let Err(e) = rabbitmq.publish(&event).await {
        tracing::error!(error = %e, routing_key = %routing_key, "failed to publish catalog event");
    }
}

pub async fn publish_skill_voted(rabbitmq: &RabbitMQClient, user_id: Uuid, skill_id: i32, vote: Option<i16>, votes: i32) {
    publish(
        rabbitmq,
        routing_keys::CATALOG_SKILL_VOTED,
        Some(user_id),
        payloads::SkillVoted { skill_id, user_id, vote, votes },
    )
    .await;
}

pub async fn publish_idea_voted(rabbitmq: &RabbitMQClient, user_id: Uuid, idea_id: i32, vote: Option<i16>, votes: i32) {
    publish(
        rabbitmq,
        routing_keys::CATALOG_IDEA_VOTED,
        Some(user_id),
        payloads::IdeaVoted { idea_id, user_id, vote, votes },
    )
    .await;
}

pub async fn publish_favorite_toggled(rabbitmq: &RabbitMQClient, user_id: Uuid, skill_id: i32, favorited: bool) {
    publish(
        rabbitmq,
        routing_keys::CATALOG_FAVORITE_TOGGLED,
        Some(user_id),
        payloads::FavoriteToggled { skill_id, user_id, favorited },
    )
    .await;
}

pub async fn publish_idea_created(rabbitmq: &RabbitMQClient, author_id: Uuid, idea_id: i32, title: &str) {
    publish(
        rabbitmq,
        routing_keys::CATALOG_IDEA_CREATED,
        Some(author_id),
        payloads::IdeaCreated { idea_id, author_id, title: title.to_string() },
    )
    .await;
}

pub async fn publish_idea_deleted(rabbitmq: &RabbitMQClient, deleted_by: Uuid, idea_id: i32, by_admin: bool) {
    publish(
        rabbitmq,
        routing_keys::CATALOG_IDEA_DELETED,
        Some(deleted_by),
        payloads::IdeaDeleted { idea_id, deleted_by, by_admin },
    )
    .await;
}

pub async fn publish_avatar_updated(rabbitmq: &RabbitMQClient, user_id: Uuid, avatar_url: &str) {
    publish(
        rabbitmq,
        routing_keys::CATALOG_AVATAR_UPDATED,
        Some(user_id),
        payloads::AvatarUpdated { user_id, avatar_url: avatar_url.to_string() },
    )
    .await;
}

/// Anonymous players are reported too, without a user id.
pub async fn publish_drill_completed(
    rabbitmq: &RabbitMQClient,
    user_id: Option<Uuid>,
    slug: &str,
    score: u32,
    total: u32,
) {
    publish(
        rabbitmq,
        routing_keys::CATALOG_DRILL_COMPLETED,
        user_id,
        payloads::DrillCompleted { slug: slug.to_string(), user_id, score, total },
    )
    .await;
}
