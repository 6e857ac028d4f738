/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - order_worker (OrderWorker)                           |
/// +----------------------------------------------------------+

/// Consumer loop of the orders queue.
pub mod order_worker;

pub use order_worker::{DeliveryOutcome, OrderWorker, WorkerError, WorkerState};
