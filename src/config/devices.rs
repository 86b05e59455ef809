//! Poll targets and polling cadence.

use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use validator::Validate;

/// One device to poll.
///
/// `name` becomes the `name` label of every gauge exported for the device;
/// `address` is the base URL the RPC path is appended to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct DeviceConfig {
    #[validate(length(min = 1, message = "Device name must not be empty"))]
    pub name: String,

    #[validate(url(message = "Device address must be an absolute URL, e.g. http://192.168.1.20"))]
    pub address: String,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Returns every device name configured more than once, with its count.
///
/// Duplicates are allowed: later updates overwrite earlier ones under the same
/// label. The caller decides whether to warn about them.
pub fn duplicate_names(devices: &[DeviceConfig]) -> Vec<(&str, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for device in devices {
        *counts.entry(device.name.as_str()).or_default() += 1;
    }
    counts.into_iter().filter(|(_, count)| *count > 1).collect()
}

/// Polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PollerConfig {
    /// Seconds between the starts of two consecutive poll cycles.
    #[validate(range(min = 1, message = "Poll interval must be at least 1 second"))]
    pub interval: u64,

    /// Per-device request timeout in seconds.
    #[validate(range(min = 1, message = "Request timeout must be at least 1 second"))]
    pub timeout: u64,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: 15,
            timeout: 5,
        }
    }
}
