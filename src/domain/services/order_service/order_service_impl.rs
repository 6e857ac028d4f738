//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                | Description                                       | Key Methods       |
// |---------------------|---------------------------------------------------|-------------------|
// | OrderServiceImpl    | Validates, prices and publishes new orders;       | create_order      |
// |                     | serves reads and status changes from the store    | update_order_status|
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::OrderLimits,
    domain::{
        models::{
            AmountOverflow, CreateOrderRequest, OrderCreatedMessage, OrderItemMessage, OrderItemResponse,
            OrderResponse, OrderStatus, compute_total,
        },
        ports::{MessagePublisher, OrderRepository},
    },
};

use super::{OrderService, OrderServiceError, validate_create_request};

/// Order service backed by an order store and a publisher to the orders queue.
pub struct OrderServiceImpl {
    repository: Arc<dyn OrderRepository>,
    publisher: Arc<dyn MessagePublisher>,
    limits: OrderLimits,
}

impl OrderServiceImpl {
    /// Creates a new OrderServiceImpl instance.
    ///
    /// # Arguments
    ///
    /// * `repository` - Store queried for persisted orders
    /// * `publisher` - Publisher to the orders queue
    /// * `limits` - Bounds applied to incoming requests
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        publisher: Arc<dyn MessagePublisher>,
        limits: OrderLimits,
    ) -> Self {
        Self {
            repository,
            publisher,
            limits,
        }
    }

    fn build_message(request: CreateOrderRequest) -> Result<OrderCreatedMessage, AmountOverflow> {
        let items: Vec<OrderItemMessage> = request
            .items
            .into_iter()
            .map(|item| OrderItemMessage {
                product_name: item.product_name.trim().to_string(),
                // range checked by validation
                quantity: u32::try_from(item.quantity).unwrap_or_default(),
                unit_price: item.unit_price,
            })
            .collect();

        Ok(OrderCreatedMessage {
            order_id: Uuid::new_v4(),
            customer_name: request.customer_name.trim().to_string(),
            customer_email: request.customer_email.trim().to_string(),
            total_amount: compute_total(items.iter().map(|item| (item.quantity, item.unit_price)))?,
            created_at: Utc::now(),
            items,
        })
    }
}

fn pending_response(message: OrderCreatedMessage) -> Result<OrderResponse, AmountOverflow> {
    Ok(OrderResponse {
        id: message.order_id,
        customer_name: message.customer_name,
        customer_email: message.customer_email,
        status: OrderStatus::Pending,
        total_amount: message.total_amount,
        created_at: message.created_at,
        updated_at: None,
        items: message
            .items
            .into_iter()
            .map(|item| OrderItemResponse::new(item.product_name, item.quantity, item.unit_price))
            .collect::<Result<_, _>>()?,
    })
}

#[async_trait]
impl OrderService for OrderServiceImpl {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderResponse, OrderServiceError> {
        validate_create_request(&request, &self.limits).map_err(|err| {
            warn!("Rejected order request: {}", err);
            err
        })?;

        let message = Self::build_message(request)?;
        let payload = message.encode()?;
        let order_id = message.order_id.to_string();
        let response = pending_response(message)?;

        self.publisher
            .publish(&order_id, payload)
            .await
            .map_err(|err| {
                error!("Failed to publish order {}: {}", order_id, err);
                err
            })?;

        info!(
            "Published order {} with {} items, total {}",
            order_id,
            response.items.len(),
            response.total_amount
        );

        Ok(response)
    }

    async fn get_order_by_id(&self, id: Uuid) -> Result<Option<OrderResponse>, OrderServiceError> {
        let order = self.repository.get_by_id(id).await?;
        if order.is_none() {
            warn!("Order {} not found", id);
        }
        Ok(order.map(OrderResponse::from))
    }

    async fn get_all_orders(&self) -> Result<Vec<OrderResponse>, OrderServiceError> {
        let orders = self.repository.get_all().await?;
        Ok(orders.into_iter().map(OrderResponse::from).collect())
    }

    async fn update_order_status(&self, id: Uuid, status: &str) -> Result<bool, OrderServiceError> {
        let Some(mut order) = self.repository.get_by_id(id).await? else {
            warn!("Cannot update status of missing order {}", id);
            return Ok(false);
        };

        let next: OrderStatus = status
            .parse()
            .map_err(|_| OrderServiceError::InvalidStatus(status.to_string()))?;

        if !order.status.can_transition_to(next) {
            return Err(OrderServiceError::IllegalTransition {
                from: order.status,
                to: next,
            });
        }

        let previous = order.status;
        order.status = next;

        match self.repository.update(order).await? {
            Some(_) => {
                info!("Order {} status changed from {} to {}", id, previous, next);
                Ok(true)
            }
            // deleted between the read and the write
            None => Ok(false),
        }
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool, OrderServiceError> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            info!("Order {} deleted", id);
        } else {
            warn!("Cannot delete missing order {}", id);
        }
        Ok(deleted)
    }
}
