//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Core of the order intake service. Models and services only talk to the outside world
// through the traits in `ports`; adapters live in `inbounds` and `outbounds`.
//--------------------------------------------------------------------------------------------------

pub mod models;
pub mod ports;
pub mod services;
