use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    models::{AmountOverflow, CodecError, CreateOrderRequest, OrderResponse, OrderStatus},
    ports::{PublishError, RepositoryError},
};

pub mod order_service_impl;
pub mod validation;

pub use order_service_impl::OrderServiceImpl;
pub use validation::{FieldViolation, ValidationError, validate_create_request};

/// Producer side of the order flow.
///
/// Accepts order requests, publishes them to the orders queue and answers queries from
/// the order store. Implementations must be thread-safe to support concurrent requests.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Validates a request, computes its total and publishes one order-created message.
    ///
    /// Does not wait for the order to be persisted.
    ///
    /// # Arguments
    /// * `request` - The order to place
    ///
    /// # Returns
    /// * `Ok(OrderResponse)` - The accepted order, status `Pending`
    /// * `Err(OrderServiceError::Validation)` - If the request breaks any rule; nothing was published
    /// * `Err(OrderServiceError::Publish)` - If the broker did not accept the message
    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderResponse, OrderServiceError>;

    /// Looks up a persisted order.
    ///
    /// # Returns
    /// * `Ok(None)` - If no order has this id
    async fn get_order_by_id(&self, id: Uuid) -> Result<Option<OrderResponse>, OrderServiceError>;

    /// Lists persisted orders, newest first.
    async fn get_all_orders(&self) -> Result<Vec<OrderResponse>, OrderServiceError>;

    /// Moves a persisted order to another status.
    ///
    /// # Arguments
    /// * `id` - The order to update
    /// * `status` - Name of the new status, case-insensitive
    ///
    /// # Returns
    /// * `Ok(true)` - If the order was updated
    /// * `Ok(false)` - If no order has this id; nothing was written
    /// * `Err(OrderServiceError::InvalidStatus)` - If `status` names no known status
    /// * `Err(OrderServiceError::IllegalTransition)` - If the order's current status forbids the move
    async fn update_order_status(&self, id: Uuid, status: &str) -> Result<bool, OrderServiceError>;

    /// Deletes a persisted order and its items.
    ///
    /// # Returns
    /// * `Ok(false)` - If no order has this id
    async fn delete_order(&self, id: Uuid) -> Result<bool, OrderServiceError>;
}

/// Errors that can occur in the order service.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The request broke one or more validation rules.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The order's total does not fit in a `Decimal`.
    #[error(transparent)]
    Amount(#[from] AmountOverflow),

    /// The order-created message could not be published.
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// The order-created message could not be encoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The order store failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The requested status is not a known status.
    #[error("Invalid order status: {0}")]
    InvalidStatus(String),

    /// The order's current status does not allow the requested one.
    #[error("Cannot change order status from {from} to {to}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },
}
