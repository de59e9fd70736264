use std::sync::Arc;
use std::time::Duration;
use futures_lite::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use skealed_shared::types::event::{payloads, routing_keys, Event};

use crate::AppState;
use crate::services::{account_service, profile_service};

/// Listen for auth.user.registered events to create empty profiles
pub async fn listen_user_registered(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state
        .rabbitmq
        .subscribe(routing_keys::AUTH_USER_REGISTERED)
        .await?;

    tracing::info!("listening for auth.user.registered events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::UserRegistered>>(&delivery.data) {
                    Ok(event) => {
                        let data = &event.data;
                        tracing::info!(credential_id = %data.credential_id, "received user.registered event");

                        if let Err(e) = profile_service::create_default_profile(&state.db, data.credential_id) {
                            tracing::error!(
                                error = %e,
                                credential_id = %data.credential_id,
                                "failed to create default profile"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize user.registered event");
                    }
                }
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
            }
        }
    }

    Ok(())
}

/// Listen for auth.user.deleted events and remove everything the catalog holds for the user
pub async fn listen_user_deleted(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state
        .rabbitmq
        .subscribe(routing_keys::AUTH_USER_DELETED)
        .await?;

    tracing::info!("listening for auth.user.deleted events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::UserDeleted>>(&delivery.data) {
                    Ok(event) => {
                        let user_id = event.data.credential_id;
                        tracing::info!(credential_id = %user_id, "received user.deleted event");
                        let outcome = purge(&state, user_id).await;
                        settle(&delivery, settlement(&outcome)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize user.deleted event");
                        settle(&delivery, Settlement::Ack).await;
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
            }
        }
    }

    Ok(())
}

/// Pause before handing a failed purge back to the broker.
const REQUEUE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Ack,
    Requeue,
}

/// A purge that did not commit goes back on the queue. Purging twice is harmless.
fn settlement<E>(outcome: &Result<(), E>) -> Settlement {
    match outcome {
        Ok(()) => Settlement::Ack,
        Err(_) => Settlement::Requeue,
    }
}

async fn settle(delivery: &Delivery, settlement: Settlement) {
    let result = match settlement {
        Settlement::Ack => delivery.ack(BasicAckOptions::default()).await,
        Settlement::Requeue => {
            tokio::time::sleep(REQUEUE_DELAY).await;
            delivery
                .nack(BasicNackOptions { requeue: true, ..Default::default() })
                .await
        }
    };
    if let Err(e) = result {
        tracing::error!(error = %e, ?settlement, "failed to settle delivery");
    }
}

async fn purge(state: &AppState, user_id: uuid::Uuid) -> Result<(), String> {
    let mut conn = state.db.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        e.to_string()
    })?;

    let avatar_key = account_service::purge_user(&mut conn, user_id).map_err(|e| {
        tracing::error!(error = %e, credential_id = %user_id, "failed to purge catalog data, requeueing");
        e.to_string()
    })?;

    if let Some(key) = avatar_key {
        if let Err(e) = state.avatars.remove(&key).await {
            tracing::warn!(error = %e, key = %key, "failed to delete avatar object");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_purge_is_acked() {
        assert_eq!(settlement::<String>(&Ok(())), Settlement::Ack);
    }

    #[test]
    fn failed_purge_is_requeued() {
        let outcome: Result<(), String> = Err("no connection available".into());
        assert_eq!(settlement(&outcome), Settlement::Requeue);
    }
}
