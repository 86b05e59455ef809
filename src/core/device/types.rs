use serde::{Deserialize, Serialize};

use super::error::DeviceError;

/// Result alias used by everything that talks to a device.
pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// The latest electrical readings of one device.
///
/// The four fields always travel together: a sample is either stored whole or
/// not at all.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Active power in watts.
    pub power: f64,
    /// Supply voltage in volts.
    pub voltage: f64,
    /// Current in amperes.
    pub current: f64,
    /// Device temperature in degrees Celsius.
    pub temperature_celsius: f64,
}

/// Body of `GET /rpc/Switch.GetStatus?id=0`.
///
/// Only `apower`, `voltage`, `current` and `temperature.tC` are required;
/// the rest is accepted when present and otherwise defaulted. Unknown fields
/// are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SwitchStatus {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub output: bool,
    pub apower: f64,
    pub voltage: f64,
    pub current: f64,
    #[serde(default)]
    pub aenergy: EnergyCounter,
    pub temperature: Temperature,
}

/// Cumulative energy counter reported alongside the status. Not republished.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnergyCounter {
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub by_minute: Vec<f64>,
    #[serde(default)]
    pub minute_ts: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Temperature {
    #[serde(rename = "tC")]
    pub celsius: f64,
    #[serde(rename = "tF", default)]
    pub fahrenheit: Option<f64>,
}

impl From<SwitchStatus> for TelemetrySample {
    fn from(status: SwitchStatus) -> Self {
        TelemetrySample {
            power: status.apower,
            voltage: status.voltage,
            current: status.current,
            temperature_celsius: status.temperature.celsius,
        }
    }
}
