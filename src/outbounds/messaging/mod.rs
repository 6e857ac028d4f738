/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - RabbitMessagePublisher, RabbitDeliverySource         |
/// |   - InMemoryQueue, InMemoryDeliverySource                |
/// +----------------------------------------------------------+

pub mod in_memory;
pub mod rabbit;

pub use in_memory::{InMemoryDeliverySource, InMemoryQueue};
pub use rabbit::{RabbitDeliverySource, RabbitMessagePublisher};
