use uuid::Uuid;

use skealed_shared::clients::rabbitmq::RabbitMQClient;
use skealed_shared::types::event::{payloads, routing_keys, Event};

const SOURCE: &str = "skealed-auth";

pub async fn publish_user_registered(rabbitmq: &RabbitMQClient, credential_id: Uuid, email: &str) {
    let event = Event::new(
        SOURCE,
        routing_keys::AUTH_USER_REGISTERED,
        payloads::UserRegistered {
            credential_id,
            email: email.to_string(),
        },
    )
    .with_user(credential_id);

    if let Err(e) = rabbitmq.publish(&event).await {
        tracing::error!(error = %e, credential_id = %credential_id, "failed to publish user.registered event");
    }
}

pub async fn publish_user_deleted(rabbitmq: &RabbitMQClient, credential_id: Uuid, email: &str) {
    let event = Event::new(
        SOURCE,
        routing_keys::AUTH_USER_DELETED,
        payloads::UserDeleted {
            credential_id,
            email: email.to_string(),
        },
    )
    .with_user(credential_id);

    if let Err(e) = rabbitmq.publish(&event).await {
        tracing::error!(error = %e, credential_id = %credential_id, "failed to publish user.deleted event");
    }
}
