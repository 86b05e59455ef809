//! One poll cycle: fetch every configured device and store what succeeded.
//!
//! Each device is fetched in its own task. A failing, slow or panicking device
//! only affects its own entry; the cycle completes once every task has
//! finished, been cancelled, or hit its timeout.

use std::{
    collections::HashMap,
    error::Error as StdError,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::{
    device::{DeviceError, TelemetrySource},
    registry::MetricsRegistry,
};
use crate::config::devices::DeviceConfig;

/// Per-cycle tally of device outcomes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Fetches abandoned because shutdown was requested mid-cycle.
    pub cancelled: usize,
}

impl CycleReport {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Updated,
    Failed,
    Cancelled,
}

/// Consecutive failed cycles per configured device, keyed by its position in
/// the device list so that devices sharing a name keep separate streaks.
///
/// Used only to pick a log level: the first failure of a streak is an error,
/// repeats are warnings carrying the streak length, and the first success
/// afterwards reports the recovery.
#[derive(Debug, Default)]
struct FailureStreaks {
    counts: Mutex<HashMap<usize, u32>>,
}

impl FailureStreaks {
    fn record_failure(&self, slot: usize) -> u32 {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let streak = counts.entry(slot).or_insert(0);
        *streak += 1;
        *streak
    }

    /// Clears the streak and returns its length if there was one.
    fn record_success(&self, slot: usize) -> Option<u32> {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.remove(&slot).filter(|streak| *streak > 0)
    }
}

/// Renders an error followed by its `source()` chain, `a: b: c`.
fn error_chain(err: &DeviceError) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// Fans a status fetch out over all configured devices.
pub struct PollCycle {
    devices: Arc<[DeviceConfig]>,
    source: Arc<dyn TelemetrySource>,
    registry: Arc<MetricsRegistry>,
    timeout: Duration,
    streaks: Arc<FailureStreaks>,
}

impl PollCycle {
    /// # Arguments
    /// * `devices` - Poll targets, in configuration order
    /// * `source` - Client used for every fetch
    /// * `registry` - Destination of successful samples
    /// * `timeout` - Upper bound for each device call
    pub fn new(
        devices: Vec<DeviceConfig>,
        source: Arc<dyn TelemetrySource>,
        registry: Arc<MetricsRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            devices: devices.into(),
            source,
            registry,
            timeout,
            streaks: Arc::new(FailureStreaks::default()),
        }
    }

    pub fn devices(&self) -> &[DeviceConfig] {
        &self.devices
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    /// Fetches every device once and waits for all of them.
    ///
    /// Tasks are spawned in configuration order; completion order is
    /// unspecified. Cancelling `shutdown` abandons fetches still in flight.
    pub async fn run_once(&self, shutdown: &CancellationToken) -> CycleReport {
        let tasks: Vec<_> = self
            .devices
            .iter()
            .cloned()
            .enumerate()
            .map(|(slot, device)| {
                let source = self.source.clone();
                let registry = self.registry.clone();
                let streaks = self.streaks.clone();
                let shutdown = shutdown.clone();
                let timeout = self.timeout;
                tokio::spawn(
                    poll_device(slot, device, source, registry, streaks, timeout, shutdown)
                        .in_current_span(),
                )
            })
            .collect();

        let mut report = CycleReport::default();
        for task in tasks {
            match task.await {
                Ok(Outcome::Updated) => report.succeeded += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::Cancelled) => report.cancelled += 1,
                Err(e) => {
                    error!("Device poll task did not complete: {}", e);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

async fn poll_device(
    slot: usize,
    device: DeviceConfig,
    source: Arc<dyn TelemetrySource>,
    registry: Arc<MetricsRegistry>,
    streaks: Arc<FailureStreaks>,
    timeout: Duration,
    shutdown: CancellationToken,
) -> Outcome {
    let result = tokio::select! {
        _ = shutdown.cancelled() => {
            debug!("Fetch of '{}' cancelled by shutdown", device.name);
            return Outcome::Cancelled;
        }
        result = source.fetch(&device.address, timeout) => result,
    };

    match result {
        Ok(sample) => {
            registry.update(&device.name, sample);
            if let Some(streak) = streaks.record_success(slot) {
                info!(
                    "Device '{}' recovered after {} failed attempt(s)",
                    device.name, streak
                );
            }
            info!(
                "Successfully fetched data from '{}' ({})",
                device.name, device.address
            );
            debug!("Sample for '{}': {:?}", device.name, sample);
            Outcome::Updated
        }
        Err(e) => {
            let streak = streaks.record_failure(slot);
            if streak == 1 {
                error!(
                    kind = e.kind(),
                    "Failed to fetch '{}': {}",
                    device.name,
                    error_chain(&e)
                );
            } else {
                warn!(
                    kind = e.kind(),
                    "Failed to fetch '{}' ({} consecutive failures): {}",
                    device.name,
                    streak,
                    error_chain(&e)
                );
            }
            Outcome::Failed
        }
    }
}
