use anyhow::Context;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use serde::Serialize;

use crate::types::Event;

pub const EXCHANGE_NAME: &str = "skealed.events";

/// Unacked deliveries a consumer may hold at once.
const PREFETCH: u16 = 16;

/// Publisher and consumer for the `skealed.events` topic exchange.
/// The event's `event_type` doubles as its routing key.
#[derive(Clone)]
pub struct RabbitMQClient {
    channel: Channel,
    service: String,
}

impl RabbitMQClient {
    pub async fn connect(url: &str, service: &str) -> anyhow::Result<Self> {
        let properties = ConnectionProperties::default().with_connection_name(service.to_string().into());
        let conn = Connection::connect(url, properties)
            .await
            .context("failed to connect to RabbitMQ")?;
        let channel = conn.create_channel().await?;

        let durable = ExchangeDeclareOptions { durable: true, ..Default::default() };
        channel
            .exchange_declare(EXCHANGE_NAME, ExchangeKind::Topic, durable, FieldTable::default())
            .await?;
        channel.basic_qos(PREFETCH, BasicQosOptions::default()).await?;

        tracing::info!(exchange = EXCHANGE_NAME, service = %service, "connected to RabbitMQ");
        Ok(Self { channel, service: service.to_string() })
    }

    pub fn is_connected(&self) -> bool {
        self.channel.status().connected()
    }

    /// Persistent JSON delivery; resolves once the broker confirms it.
    pub async fn publish<T: Serialize>(&self, event: &Event<T>) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(event).context("failed to serialize event")?;
        let properties = BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            .with_message_id(ShortString::from(event.id.to_string()))
            .with_app_id(ShortString::from(self.service.as_str()))
            .with_delivery_mode(2);

        self.channel
            .basic_publish(
                EXCHANGE_NAME,
                &event.event_type,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await?
            .await?;

        tracing::debug!(event_type = %event.event_type, event_id = %event.id, "event published");
        Ok(())
    }

    /// Consumes `routing_key` through this service's own durable queue, so every
    /// subscribing service gets its own copy and restarts resume where they left off.
    pub async fn subscribe(&self, routing_key: &str) -> anyhow::Result<Consumer> {
        let queue = queue_name(&self.service, routing_key);

        self.channel
            .queue_declare(
                &queue,
                QueueDeclareOptions { durable: true, ..Default::default() },
                FieldTable::default(),
            )
            .await?;
        self.channel
            .queue_bind(&queue, EXCHANGE_NAME, routing_key, QueueBindOptions::default(), FieldTable::default())
            .await
            .with_context(|| format!("failed to bind {queue} to {routing_key}"))?;

        let consumer = self
            .channel
            .basic_consume(
                &queue,
                &format!("{}-{}", self.service, uuid::Uuid::new_v4().simple()),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %queue, routing_key = %routing_key, "subscribed to RabbitMQ queue");
        Ok(consumer)
    }
}

/// `skealed-catalog` + `skealed.auth.user.deleted` -> `skealed-catalog.auth.user.deleted`
fn queue_name(service: &str, routing_key: &str) -> String {
    let topic = routing_key.strip_prefix("skealed.").unwrap_or(routing_key);
    format!("{service}.{topic}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queues_are_named_per_service_and_topic() {
        assert_eq!(
            queue_name("skealed-catalog", "skealed.auth.user.deleted"),
            "skealed-catalog.auth.user.deleted"
        );
        assert_eq!(queue_name("skealed-audit", "custom.topic"), "skealed-audit.custom.topic");
    }
}
