use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::{
    models::Order,
    ports::{OrderRepository, RepositoryError},
};

/// Order store kept in process memory.
///
/// Used for local runs without a database and for end-to-end tests. Clones share the
/// same storage.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::AlreadyExists(order.id));
        }
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().get(&id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self.orders.read().values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update(&self, order: Order) -> Result<Option<Order>, RepositoryError> {
        let mut orders = self.orders.write();
        let Some(stored) = orders.get_mut(&order.id) else {
            return Ok(None);
        };

        stored.customer_name = order.customer_name;
        stored.customer_email = order.customer_email;
        stored.status = order.status;
        stored.total_amount = order.total_amount;
        stored.updated_at = Some(Utc::now());

        Ok(Some(stored.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepositoryError> {
        Ok(self.orders.write().remove(&id).is_some())
    }
}
