//! RabbitMQ adapters for the messaging ports.

use async_trait::async_trait;
use rabbitmq::{Message, PublisherContext, PublisherDispatcher, RabbitMQError, Subscription};
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{Delivery, DeliverySource, MessagePublisher, PublishError, QueueError};

impl From<RabbitMQError> for PublishError {
    fn from(err: RabbitMQError) -> Self {
        match err {
            RabbitMQError::PublisherClosed => PublishError::Closed,
            other => PublishError::Broker(other.to_string()),
        }
    }
}

/// Publishes to one durable queue through a `rabbitmq` publisher.
///
/// The owning `rabbitmq::Publisher` stays with the caller, which closes it on shutdown.
#[derive(Clone)]
pub struct RabbitMessagePublisher {
    dispatcher: PublisherDispatcher,
}

impl RabbitMessagePublisher {
    pub fn new(dispatcher: PublisherDispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl MessagePublisher for RabbitMessagePublisher {
    async fn publish(&self, message_id: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let ctx = PublisherContext::new(&Uuid::new_v4().to_string(), Some(message_id.to_string()));

        self.dispatcher.publish(Message::new(payload), ctx).await?;

        debug!("Published message {} to {}", message_id, self.dispatcher.queue_name());
        Ok(())
    }
}

/// Delivery source over a `rabbitmq` subscription.
pub struct RabbitDeliverySource {
    subscription: Subscription,
}

impl RabbitDeliverySource {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }
}

#[async_trait]
impl DeliverySource for RabbitDeliverySource {
    async fn next_delivery(&mut self) -> Option<Delivery> {
        let received = self.subscription.receive().await?;

        Some(Delivery {
            delivery_tag: received.delivery_tag(),
            message_id: received.message_id().map(str::to_string),
            redelivered: received.redelivered(),
            body: received.into_content(),
        })
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), QueueError> {
        self.subscription
            .ack(delivery_tag)
            .await
            .map_err(|err| QueueError::Settle {
                tag: delivery_tag,
                reason: err.to_string(),
            })
    }

    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), QueueError> {
        self.subscription
            .nack(delivery_tag, requeue)
            .await
            .map_err(|err| QueueError::Settle {
                tag: delivery_tag,
                reason: err.to_string(),
            })
    }

    async fn close(self) -> Result<(), QueueError> {
        self.subscription
            .close()
            .await
            .map_err(|err| QueueError::Close(err.to_string()))
    }
}
