//! Core runtime: device access, the sample registry, the poll cycle and its
//! scheduler, and the scrape endpoint.

pub mod device;
pub mod exposition;
pub mod poller;
pub mod registry;
pub mod scheduler;
pub mod server;
