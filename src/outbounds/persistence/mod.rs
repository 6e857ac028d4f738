/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - PostgresOrderRepository                              |
/// |   - InMemoryOrderRepository                              |
/// +----------------------------------------------------------+

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;
