use std::time::Duration;

use super::types::{DeviceResult, TelemetrySample};

/// Anything that can produce a telemetry sample for a device address.
///
/// The poller only depends on this trait, so a cycle can be driven by the real
/// HTTP client or by an in-memory double.
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync + 'static {
    /// Performs a single attempt to read the device at `address`, bounded by
    /// `timeout`. Implementations must not retry.
    async fn fetch(&self, address: &str, timeout: Duration) -> DeviceResult<TelemetrySample>;
}
