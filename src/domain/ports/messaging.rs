use async_trait::async_trait;
use thiserror::Error;

/// Publishes raw payloads to one durable queue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publishes a persistent message.
    ///
    /// Resolves once the broker accepted the message on its channel.
    ///
    /// # Arguments
    /// * `message_id` - Identifier consumers use to correlate redeliveries
    /// * `payload` - The encoded message
    async fn publish(&self, message_id: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// A message handed to a consumer, not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub message_id: Option<String>,
    pub redelivered: bool,
    pub body: Vec<u8>,
}

/// A consumer's view of a queue with manual acknowledgement.
///
/// The source is acquired once per consumer and released with `close`, after which
/// every delivery that was neither acked nor nacked goes back to the queue.
#[async_trait]
pub trait DeliverySource: Send {
    /// Waits for the next delivery.
    ///
    /// # Returns
    /// * `None` - Once the underlying stream has ended
    async fn next_delivery(&mut self) -> Option<Delivery>;

    /// Acknowledges a single delivery as processed.
    async fn ack(&mut self, delivery_tag: u64) -> Result<(), QueueError>;

    /// Rejects a single delivery, putting it back on the queue when `requeue` is set.
    async fn nack(&mut self, delivery_tag: u64, requeue: bool) -> Result<(), QueueError>;

    /// Releases the source.
    async fn close(self) -> Result<(), QueueError>
    where
        Self: Sized;
}

/// Errors that can occur while publishing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The broker refused or failed the publish.
    #[error("Failed to publish message: {0}")]
    Broker(String),

    /// The publisher was shut down.
    #[error("Publisher is closed")]
    Closed,
}

/// Errors that can occur while consuming.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Connecting or subscribing to the queue failed.
    #[error("Failed to subscribe: {0}")]
    Subscribe(String),

    /// An acknowledgement or rejection could not be delivered.
    #[error("Failed to settle delivery {tag}: {reason}")]
    Settle { tag: u64, reason: String },

    /// Releasing the subscription failed.
    #[error("Failed to close subscription: {0}")]
    Close(String),
}
