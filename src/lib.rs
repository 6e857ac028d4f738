//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Order intake service: an HTTP API publishes order-created messages to a durable queue and
// a worker consumes them into a relational store.
//
// | Module      | Description                                                        |
// |-------------|--------------------------------------------------------------------|
// | domain      | Models, ports and services of the order flow                       |
// | api         | HTTP facade over the order service                                 |
// | inbounds    | Consumer loop of the orders queue                                  |
// | outbounds   | RabbitMQ, PostgreSQL and in-memory adapters                        |
// | config      | Environment configuration                                          |
//--------------------------------------------------------------------------------------------------

pub mod api;
pub mod config;
pub mod domain;
pub mod inbounds;
pub mod outbounds;

// Re-export key types for easier usage
pub use api::Api;
pub use config::{Config, OrderLimits};
pub use domain::models::{
    CreateOrderRequest, Order, OrderCreatedMessage, OrderItem, OrderItemMessage, OrderItemRequest,
    OrderResponse, OrderStatus,
};
pub use domain::services::order_message_handler::{OrderMessageHandler, OrderMessageHandlerImpl};
pub use domain::services::order_service::{OrderService, OrderServiceError, OrderServiceImpl};
pub use inbounds::{DeliveryOutcome, OrderWorker, WorkerState};
