//! Prometheus text rendering of a registry snapshot.
//!
//! A fresh set of gauge vectors is filled from one snapshot per scrape. This
//! keeps every value of a device within a scrape tied to the same sample and
//! means a device that never reported has no series at all.

use std::{collections::BTreeMap, string::FromUtf8Error};

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use super::device::TelemetrySample;

/// Label carrying the configured device name.
pub const NAME_LABEL: &str = "name";

/// `Content-Type` of the rendered exposition.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

#[derive(Error, Debug)]
pub enum ExpositionError {
    /// Gauge creation, registration or encoding failed.
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Encoded metrics are not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// The four republished gauge vectors and the registry that owns them.
pub struct TelemetryGauges {
    registry: Registry,
    power: GaugeVec,
    voltage: GaugeVec,
    current: GaugeVec,
    temperature: GaugeVec,
}

fn register_gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec, ExpositionError> {
    let gauge = GaugeVec::new(Opts::new(name, help), &[NAME_LABEL])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl TelemetryGauges {
    /// # Errors
    ///
    /// Fails if a gauge definition is rejected by the Prometheus registry.
    pub fn new() -> Result<Self, ExpositionError> {
        let registry = Registry::new();
        let power = register_gauge(
            &registry,
            "shelly_power_watts",
            "Current power consumption in watts",
        )?;
        let voltage = register_gauge(&registry, "shelly_voltage_volts", "Current voltage in volts")?;
        let current = register_gauge(&registry, "shelly_current_amperes", "Current in amperes")?;
        let temperature = register_gauge(
            &registry,
            "shelly_temperature_celsius",
            "Temperature in degrees Celsius",
        )?;

        Ok(Self {
            registry,
            power,
            voltage,
            current,
            temperature,
        })
    }

    /// Sets all four gauges of `name` from `sample`.
    pub fn observe(&self, name: &str, sample: &TelemetrySample) {
        self.power.with_label_values(&[name]).set(sample.power);
        self.voltage.with_label_values(&[name]).set(sample.voltage);
        self.current.with_label_values(&[name]).set(sample.current);
        self.temperature
            .with_label_values(&[name])
            .set(sample.temperature_celsius);
    }

    pub fn encode(&self) -> Result<String, ExpositionError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Renders `snapshot` in the Prometheus text exposition format.
pub fn render(snapshot: &BTreeMap<String, TelemetrySample>) -> Result<String, ExpositionError> {
    let gauges = TelemetryGauges::new()?;
    for (name, sample) in snapshot {
        gauges.observe(name, sample);
    }
    gauges.encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetrySample {
        TelemetrySample {
            power: 12.5,
            voltage: 230.1,
            current: 0.054,
            temperature_celsius: 32.5,
        }
    }

    #[test]
    fn gauges_register_cleanly() {
        assert!(TelemetryGauges::new().is_ok());
    }

    #[test]
    fn render_exposes_all_four_gauges_per_device() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert("dev1".to_string(), sample());

        let output = render(&snapshot).unwrap();

        assert!(output.contains("# TYPE shelly_power_watts gauge"));
        assert!(output.contains("shelly_power_watts{name=\"dev1\"} 12.5"));
        assert!(output.contains("shelly_voltage_volts{name=\"dev1\"} 230.1"));
        assert!(output.contains("shelly_current_amperes{name=\"dev1\"} 0.054"));
        assert!(output.contains("shelly_temperature_celsius{name=\"dev1\"} 32.5"));
    }

    #[test]
    fn render_labels_each_device_separately() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert("dev1".to_string(), sample());
        snapshot.insert(
            "dev2".to_string(),
            TelemetrySample {
                power: 100.0,
                ..sample()
            },
        );

        let output = render(&snapshot).unwrap();
        assert!(output.contains("shelly_power_watts{name=\"dev1\"} 12.5"));
        assert!(output.contains("shelly_power_watts{name=\"dev2\"} 100"));
    }

    #[test]
    fn empty_snapshot_exposes_no_series() {
        let output = render(&BTreeMap::new()).unwrap();
        assert!(!output.contains("name=\""));
    }
}
