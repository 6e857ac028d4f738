/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - repository (OrderRepository)                         |
/// |   - messaging (MessagePublisher, DeliverySource)         |
/// +----------------------------------------------------------+

/// Storage of persisted orders.
pub mod repository;

/// Publishing to and consuming from work queues.
pub mod messaging;

pub use messaging::{Delivery, DeliverySource, MessagePublisher, PublishError, QueueError};
pub use repository::{OrderRepository, RepositoryError};
