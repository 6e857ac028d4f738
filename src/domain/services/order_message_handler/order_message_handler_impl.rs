use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::domain::{
    models::{Order, OrderCreatedMessage, OrderItem, OrderStatus},
    ports::{OrderRepository, RepositoryError},
};

use super::{HandleOutcome, OrderMessageError, OrderMessageHandler};

/// Handler persisting orders through an [`OrderRepository`].
pub struct OrderMessageHandlerImpl {
    repository: Arc<dyn OrderRepository>,
}

impl OrderMessageHandlerImpl {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        Self { repository }
    }
}

/// Maps an order-created message to the completed order to persist.
///
/// The order keeps the message's id and creation time. Each item's total price is
/// computed here, once.
///
/// # Errors
/// Returns an error if the message has no items, a line has a zero quantity or a
/// non-positive unit price, an amount overflows, or the declared total does not match
/// the sum of its lines
pub fn order_from_message(message: OrderCreatedMessage) -> Result<Order, OrderMessageError> {
    let order_id = message.order_id;

    if message.items.is_empty() {
        return Err(OrderMessageError::NoItems(order_id));
    }

    for (line, item) in message.items.iter().enumerate() {
        if item.quantity == 0 {
            return Err(OrderMessageError::InvalidQuantity { order_id, line });
        }
        if item.unit_price <= Decimal::ZERO {
            return Err(OrderMessageError::InvalidUnitPrice {
                order_id,
                line,
                unit_price: item.unit_price,
            });
        }
    }

    let computed = message
        .items_total()
        .map_err(|_| OrderMessageError::AmountOverflow(order_id))?;
    if computed != message.total_amount {
        return Err(OrderMessageError::TotalMismatch {
            order_id: message.order_id,
            declared: message.total_amount,
            computed,
        });
    }

    let items = message
        .items
        .into_iter()
        .map(|item| OrderItem::new(order_id, item.product_name, item.quantity, item.unit_price))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| OrderMessageError::AmountOverflow(order_id))?;

    Ok(Order {
        id: order_id,
        customer_name: message.customer_name,
        customer_email: message.customer_email,
        status: OrderStatus::Completed,
        total_amount: message.total_amount,
        created_at: message.created_at,
        updated_at: None,
        items,
    })
}

#[async_trait]
impl OrderMessageHandler for OrderMessageHandlerImpl {
    async fn handle(&self, message: OrderCreatedMessage) -> Result<HandleOutcome, OrderMessageError> {
        let order = order_from_message(message)?;
        let order_id = order.id;

        match self.repository.create(order).await {
            Ok(stored) => {
                info!(
                    "Persisted order {} with {} items, total {}",
                    stored.id,
                    stored.items.len(),
                    stored.total_amount
                );
                Ok(HandleOutcome::Persisted)
            }
            Err(RepositoryError::AlreadyExists(_)) => {
                warn!("Order {} was already persisted, skipping", order_id);
                Ok(HandleOutcome::AlreadyPersisted)
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        models::OrderItemMessage,
        ports::repository::MockOrderRepository,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn message() -> OrderCreatedMessage {
        OrderCreatedMessage {
            order_id: Uuid::new_v4(),
            customer_name: "John Doe".into(),
            customer_email: "john@example.com".into(),
            total_amount: dec!(46.00),
            created_at: Utc::now(),
            items: vec![
                OrderItemMessage {
                    product_name: "Product A".into(),
                    quantity: 2,
                    unit_price: dec!(10.50),
                },
                OrderItemMessage {
                    product_name: "Product B".into(),
                    quantity: 1,
                    unit_price: dec!(25.00),
                },
            ],
        }
    }

    #[test]
    fn test_message_maps_to_completed_order_with_same_identity() {
        let message = message();
        let order = order_from_message(message.clone()).unwrap();

        assert_eq!(order.id, message.order_id);
        assert_eq!(order.created_at, message.created_at);
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.total_amount, dec!(46.00));
        assert_eq!(order.updated_at, None);
        assert_eq!(order.items[0].total_price, dec!(21.00));
        assert_eq!(order.items[1].total_price, dec!(25.00));
        assert!(order.items.iter().all(|item| item.order_id == message.order_id));
    }

    #[test]
    fn test_total_mismatch_is_rejected() {
        let mut message = message();
        message.total_amount = dec!(50.00);

        assert!(matches!(
            order_from_message(message),
            Err(OrderMessageError::TotalMismatch { computed, .. }) if computed == dec!(46.00)
        ));
    }

    #[test]
    fn test_message_without_items_is_rejected() {
        let mut message = message();
        message.items.clear();
        message.total_amount = dec!(0);

        assert!(matches!(order_from_message(message), Err(OrderMessageError::NoItems(_))));
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let mut message = message();
        message.items[0].quantity = 0;
        message.total_amount = dec!(25.00);

        assert_eq!(
            order_from_message(message.clone()),
            Err(OrderMessageError::InvalidQuantity {
                order_id: message.order_id,
                line: 0
            })
        );
    }

    #[test]
    fn test_non_positive_unit_price_is_rejected() {
        let mut message = message();
        message.items[1].unit_price = dec!(-5.00);
        message.total_amount = dec!(16.00);

        assert_eq!(
            order_from_message(message.clone()),
            Err(OrderMessageError::InvalidUnitPrice {
                order_id: message.order_id,
                line: 1,
                unit_price: dec!(-5.00)
            })
        );

        message.items[1].unit_price = Decimal::ZERO;
        message.total_amount = dec!(21.00);
        assert!(matches!(
            order_from_message(message),
            Err(OrderMessageError::InvalidUnitPrice { line: 1, .. })
        ));
    }

    #[test]
    fn test_overflowing_amount_is_rejected() {
        let mut message = message();
        message.items[0].quantity = 4_000_000_000;
        message.items[0].unit_price = "79228162514264337593543950".parse().unwrap();

        assert_eq!(
            order_from_message(message.clone()),
            Err(OrderMessageError::AmountOverflow(message.order_id))
        );
    }

    #[tokio::test]
    async fn test_handle_persists_order() {
        let message = message();
        let id = message.order_id;

        let mut repository = MockOrderRepository::new();
        repository
            .expect_create()
            .withf(move |order| order.id == id && order.status == OrderStatus::Completed)
            .times(1)
            .returning(Ok);

        let outcome = OrderMessageHandlerImpl::new(Arc::new(repository))
            .handle(message)
            .await
            .unwrap();

        assert_eq!(outcome, HandleOutcome::Persisted);
    }

    #[tokio::test]
    async fn test_handle_treats_existing_order_as_done() {
        let mut repository = MockOrderRepository::new();
        repository
            .expect_create()
            .returning(|order| Err(RepositoryError::AlreadyExists(order.id)));

        let outcome = OrderMessageHandlerImpl::new(Arc::new(repository))
            .handle(message())
            .await
            .unwrap();

        assert_eq!(outcome, HandleOutcome::AlreadyPersisted);
    }

    #[tokio::test]
    async fn test_handle_surfaces_store_failures() {
        let mut repository = MockOrderRepository::new();
        repository
            .expect_create()
            .returning(|_| Err(RepositoryError::Database("connection reset".into())));

        let result = OrderMessageHandlerImpl::new(Arc::new(repository))
            .handle(message())
            .await;

        assert!(matches!(result, Err(OrderMessageError::Repository(_))));
    }
}
