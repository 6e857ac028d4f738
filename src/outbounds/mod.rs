/// +----------------------------------------------------------+
/// | MODULES                                                  |
/// +----------+-------+-------+------------------------------+
/// | Exports:                                                 |
/// |   - messaging (queue adapters)                           |
/// |   - persistence (order store adapters)                   |
/// +----------------------------------------------------------+

/// Adapters implementing the messaging ports.
pub mod messaging;

/// Adapters implementing the order repository port.
pub mod persistence;
