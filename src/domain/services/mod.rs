/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - order_service (OrderService, producer side)          |
/// |   - order_message_handler (OrderMessageHandler,          |
/// |     consumer side)                                       |
/// +----------------------------------------------------------+

pub mod order_message_handler;
pub mod order_service;
