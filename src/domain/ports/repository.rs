use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::Order;

/// Persistent storage for orders and their items.
///
/// Implementations must be thread-safe; one instance is shared between all request
/// handlers or by the worker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts an order with its items under the order's own id.
    ///
    /// # Arguments
    /// * `order` - The order to insert; its `id` and `created_at` are kept as given
    ///
    /// # Returns
    /// * `Ok(Order)` - The stored order
    /// * `Err(RepositoryError::AlreadyExists)` - If an order with this id is already stored;
    ///   nothing is written in that case
    async fn create(&self, order: Order) -> Result<Order, RepositoryError>;

    /// Loads an order with its items.
    ///
    /// # Returns
    /// * `Ok(None)` - If no order has this id
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// Loads every order with its items, most recently created first.
    async fn get_all(&self) -> Result<Vec<Order>, RepositoryError>;

    /// Overwrites the order's customer fields, status and total and stamps `updated_at`.
    ///
    /// Items are left untouched.
    ///
    /// # Returns
    /// * `Ok(Some(Order))` - The order as stored after the update
    /// * `Ok(None)` - If no order has this id
    async fn update(&self, order: Order) -> Result<Option<Order>, RepositoryError>;

    /// Deletes an order together with its items.
    ///
    /// # Returns
    /// * `Ok(true)` - If the order existed and was removed
    /// * `Ok(false)` - If no order has this id
    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

/// Errors that can occur while accessing the order store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// An order with the same id is already stored.
    #[error("Order already exists: {0}")]
    AlreadyExists(Uuid),

    /// The store rejected or failed the operation.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped back to an order.
    #[error("Corrupted order row: {0}")]
    Decode(String),
}
