/// Persisted order entity and status rules.
pub mod order;

/// Messages exchanged through the orders queue.
pub mod messages;

/// Requests accepted and responses returned by the intake service.
pub mod dtos;

pub use dtos::{CreateOrderRequest, OrderItemRequest, OrderItemResponse, OrderResponse};
pub use messages::{CodecError, OrderCreatedMessage, OrderItemMessage, compute_total};
pub use order::{AmountOverflow, Order, OrderItem, OrderStatus, OrderStatusError, line_total};
