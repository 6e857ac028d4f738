//--------------------------------------------------------------------------------------------------
// TEST MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// End-to-end tests of the publish-then-consume handoff: the order service publishes to an
// in-memory queue and the worker consumes it into an in-memory store.
//--------------------------------------------------------------------------------------------------

use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use order_intake::{
    CreateOrderRequest, OrderCreatedMessage, OrderItemRequest, OrderLimits, OrderMessageHandler,
    OrderMessageHandlerImpl, OrderService, OrderServiceImpl, OrderStatus, OrderWorker, WorkerState,
    domain::{
        ports::{DeliverySource, OrderRepository},
        services::order_message_handler::{HandleOutcome, OrderMessageError},
    },
    outbounds::{messaging::InMemoryQueue, persistence::InMemoryOrderRepository},
};

fn sample_request() -> CreateOrderRequest {
    CreateOrderRequest {
        customer_name: "John Doe".into(),
        customer_email: "john@example.com".into(),
        items: vec![
            OrderItemRequest {
                product_name: "Product A".into(),
                quantity: 2,
                unit_price: dec!(10.50),
            },
            OrderItemRequest {
                product_name: "Product B".into(),
                quantity: 1,
                unit_price: dec!(25.00),
            },
        ],
    }
}

fn service(repository: &InMemoryOrderRepository, queue: &InMemoryQueue) -> OrderServiceImpl {
    OrderServiceImpl::new(
        Arc::new(repository.clone()),
        Arc::new(queue.clone()),
        OrderLimits::default(),
    )
}

fn worker(repository: &InMemoryOrderRepository) -> OrderWorker {
    OrderWorker::new(Arc::new(OrderMessageHandlerImpl::new(Arc::new(repository.clone()))))
}

/// Runs the worker until the queue is drained.
async fn drain(worker: &OrderWorker, queue: &InMemoryQueue) {
    queue.shutdown();
    let source = queue.consume();
    tokio::time::timeout(
        Duration::from_secs(5),
        worker.run(async move { Ok(source) }, CancellationToken::new()),
    )
    .await
    .expect("worker did not drain the queue")
    .unwrap();
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_order_is_published_then_persisted_as_completed() {
    let repository = InMemoryOrderRepository::new();
    let queue = InMemoryQueue::new("orders");
    let service = service(&repository, &queue);

    let created = service.create_order(sample_request()).await.unwrap();
    assert_eq!(created.status, OrderStatus::Pending);
    assert_eq!(created.total_amount, dec!(46.00));
    assert_eq!(queue.published_count(), 1);

    // not persisted until the worker ran
    assert!(service.get_order_by_id(created.id).await.unwrap().is_none());

    drain(&worker(&repository), &queue).await;

    let persisted = service.get_order_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(persisted.id, created.id);
    assert_eq!(persisted.created_at, created.created_at);
    assert_eq!(persisted.status, OrderStatus::Completed);
    assert_eq!(persisted.total_amount, dec!(46.00));
    assert_eq!(persisted.items.len(), 2);
    assert_eq!(persisted.items[0].total_price, dec!(21.00));
    assert_eq!(persisted.items[1].total_price, dec!(25.00));

    assert_eq!(queue.acked_count(), 1);
    assert_eq!(queue.nacked_count(), 0);
    assert_eq!(queue.unacked_len(), 0);
}

#[tokio::test]
async fn test_poison_message_is_dead_lettered_after_max_attempts() {
    let repository = InMemoryOrderRepository::new();
    let queue = InMemoryQueue::new("orders");
    let dead_letter = InMemoryQueue::new("orders.dead-letter");

    queue.push(Some("poison".into()), b"{ definitely not an order".to_vec());
    service(&repository, &queue)
        .create_order(sample_request())
        .await
        .unwrap();

    let worker = worker(&repository).with_dead_letter(Arc::new(dead_letter.clone()), 3);
    drain(&worker, &queue).await;

    assert_eq!(
        dead_letter.ready_bodies(),
        vec![b"{ definitely not an order".to_vec()]
    );
    assert_eq!(queue.nacked_count(), 2);
    assert_eq!(queue.acked_count(), 2);
    assert_eq!(repository.len(), 1);
}

#[tokio::test]
async fn test_corrupted_payload_is_requeued_without_dead_letter_policy() {
    let repository = InMemoryOrderRepository::new();
    let queue = InMemoryQueue::new("orders");
    queue.push(Some("poison".into()), b"garbage".to_vec());

    let worker = worker(&repository);
    let mut source = queue.consume();

    let delivery = source.next_delivery().await.unwrap();
    let outcome = worker.process_delivery(&mut source, delivery).await.unwrap();

    assert_eq!(outcome, order_intake::DeliveryOutcome::Requeued);
    assert_eq!(queue.nacked_count(), 1);
    assert_eq!(queue.acked_count(), 0);
    assert_eq!(queue.ready_len(), 1);
    assert!(repository.is_empty());
}

#[tokio::test]
async fn test_overflowing_amounts_are_requeued_not_fatal() {
    let repository = InMemoryOrderRepository::new();
    let queue = InMemoryQueue::new("orders");
    let payload = serde_json::json!({
        "orderId": uuid::Uuid::new_v4(),
        "customerName": "John Doe",
        "customerEmail": "john@example.com",
        "totalAmount": "1.00",
        "createdAt": "2024-05-01T10:00:00Z",
        "items": [{
            "productName": "Product A",
            "quantity": 4_000_000_000u32,
            "unitPrice": "79228162514264337593543950"
        }]
    });
    queue.push(Some("huge".into()), payload.to_string().into_bytes());

    let worker = worker(&repository);
    let mut source = queue.consume();

    let delivery = source.next_delivery().await.unwrap();
    let outcome = worker.process_delivery(&mut source, delivery).await.unwrap();

    assert_eq!(outcome, order_intake::DeliveryOutcome::Requeued);
    assert_eq!(queue.nacked_count(), 1);
    assert_eq!(queue.ready_len(), 1);
    assert!(repository.is_empty());
}

#[tokio::test]
async fn test_overflowing_amounts_end_in_dead_letter_queue() {
    let repository = InMemoryOrderRepository::new();
    let queue = InMemoryQueue::new("orders");
    let dead_letter = InMemoryQueue::new("orders.dead-letter");
    let payload = serde_json::json!({
        "orderId": uuid::Uuid::new_v4(),
        "customerName": "John Doe",
        "customerEmail": "john@example.com",
        "totalAmount": "1.00",
        "createdAt": "2024-05-01T10:00:00Z",
        "items": [{ "productName": "Product A", "quantity": 2, "unitPrice": "79228162514264337593543950" }]
    })
    .to_string()
    .into_bytes();
    queue.push(None, payload.clone());

    let worker = worker(&repository).with_dead_letter(Arc::new(dead_letter.clone()), 2);
    drain(&worker, &queue).await;

    assert_eq!(dead_letter.ready_bodies(), vec![payload]);
    assert_eq!(queue.nacked_count(), 1);
    assert_eq!(queue.acked_count(), 1);
    assert!(repository.is_empty());
}

#[tokio::test]
async fn test_redelivered_order_is_acked_once_persisted() {
    let repository = InMemoryOrderRepository::new();
    let queue = InMemoryQueue::new("orders");
    let service = service(&repository, &queue);

    let created = service.create_order(sample_request()).await.unwrap();
    // a lost ack after a successful commit leads to the same message again
    let duplicate = queue.ready_bodies().remove(0);
    queue.push(Some(created.id.to_string()), duplicate);

    drain(&worker(&repository), &queue).await;

    assert_eq!(repository.len(), 1);
    assert_eq!(queue.acked_count(), 2);
    assert_eq!(queue.nacked_count(), 0);
}

/// Handler that never finishes, standing in for a slow store.
struct StuckHandler;

#[async_trait]
impl OrderMessageHandler for StuckHandler {
    async fn handle(&self, _message: OrderCreatedMessage) -> Result<HandleOutcome, OrderMessageError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_cancellation_leaves_in_flight_delivery_unacked() {
    let repository = InMemoryOrderRepository::new();
    let queue = InMemoryQueue::new("orders");
    service(&repository, &queue)
        .create_order(sample_request())
        .await
        .unwrap();

    let worker = Arc::new(OrderWorker::new(Arc::new(StuckHandler)));
    let cancel = CancellationToken::new();

    let running = {
        let worker = worker.clone();
        let cancel = cancel.clone();
        let source = queue.consume();
        tokio::spawn(async move { worker.run(async move { Ok(source) }, cancel).await })
    };

    wait_until(|| queue.unacked_len() == 1).await;
    assert_eq!(worker.state(), WorkerState::Consuming);

    cancel.cancel();
    running.await.unwrap().unwrap();

    assert_eq!(worker.state(), WorkerState::Stopped);
    assert_eq!(queue.acked_count(), 0);
    assert_eq!(queue.nacked_count(), 0);
    assert_eq!(queue.unacked_len(), 0);

    let mut source = queue.consume();
    let redelivered = source.next_delivery().await.unwrap();
    assert!(redelivered.redelivered);
    assert!(repository.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_worker_refuses_to_run_twice() {
    let repository = InMemoryOrderRepository::new();
    let queue = InMemoryQueue::new("orders");
    let worker = Arc::new(worker(&repository));
    let cancel = CancellationToken::new();

    let running = {
        let worker = worker.clone();
        let cancel = cancel.clone();
        let source = queue.consume();
        tokio::spawn(async move { worker.run(async move { Ok(source) }, cancel).await })
    };

    wait_until(|| worker.state() == WorkerState::Consuming).await;

    let second = worker
        .run(async { Ok(queue.consume()) }, CancellationToken::new())
        .await;
    assert_eq!(second, Err(order_intake::inbounds::WorkerError::AlreadyRunning));

    cancel.cancel();
    running.await.unwrap().unwrap();
}
