//! Device access: wire types, errors and the HTTP status client.

pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::HttpDeviceClient;
pub use error::DeviceError;
pub use traits::TelemetrySource;
pub use types::{DeviceResult, TelemetrySample};

#[cfg(test)]
pub(crate) mod testing;
