use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{models::OrderCreatedMessage, ports::RepositoryError};

pub mod order_message_handler_impl;

pub use order_message_handler_impl::{OrderMessageHandlerImpl, order_from_message};

/// Consumer side of the order flow: turns an order-created message into a stored order.
#[async_trait]
pub trait OrderMessageHandler: Send + Sync {
    /// Maps the message to a completed order and persists it.
    ///
    /// # Returns
    /// * `Ok(HandleOutcome::Persisted)` - If the order was stored
    /// * `Ok(HandleOutcome::AlreadyPersisted)` - If an order with this id was already stored,
    ///   which happens when a delivery is redelivered after a lost acknowledgement
    /// * `Err(OrderMessageError)` - If the message is inconsistent or the store failed
    async fn handle(&self, message: OrderCreatedMessage) -> Result<HandleOutcome, OrderMessageError>;
}

/// What handling a message did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Persisted,
    AlreadyPersisted,
}

/// Errors that can occur while handling an order message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderMessageError {
    /// The message carries no items.
    #[error("Order {0} has no items")]
    NoItems(Uuid),

    /// A line orders no units.
    #[error("Order {order_id} line {line} has a zero quantity")]
    InvalidQuantity { order_id: Uuid, line: usize },

    /// A line's unit price is zero or negative.
    #[error("Order {order_id} line {line} has non-positive unit price {unit_price}")]
    InvalidUnitPrice {
        order_id: Uuid,
        line: usize,
        unit_price: Decimal,
    },

    /// A line or order total exceeds the range of `Decimal`.
    #[error("Order {0} has an amount that exceeds the supported range")]
    AmountOverflow(Uuid),

    /// The declared total differs from the sum of the lines.
    #[error("Order {order_id} declares total {declared} but its items sum to {computed}")]
    TotalMismatch {
        order_id: Uuid,
        declared: Decimal,
        computed: Decimal,
    },

    /// Persisting the order failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
