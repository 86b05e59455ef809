//! shelly-exporter - Prometheus exporter for Shelly Gen2 power meters
//!
//! The exporter polls a fixed list of devices over HTTP on a fixed cadence,
//! keeps the latest power, voltage, current and temperature reading of each
//! one, and serves them as labeled gauges for Prometheus to scrape.
//!
//! ## Modules
//!
//! * `config` - TOML configuration: devices, polling cadence, scrape endpoint
//!   and logging, validated with the `validator` crate.
//!
//! * `core` - Runtime components:
//!   - Device status client (`reqwest`)
//!   - Latest-sample registry shared by poller and server
//!   - Poll cycle with per-device error isolation
//!   - Interruptible fixed-interval scheduler
//!   - Scrape endpoint (`axum` + `prometheus`)
//!
//! * `logger` - `tracing` subscriber setup with console (compact, pretty,
//!   JSON) and optional systemd journald outputs.

pub mod config;
pub mod core;
pub mod logger;
