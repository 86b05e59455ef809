//! In-memory `TelemetrySource` for poller and scheduler tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use super::{DeviceError, DeviceResult, TelemetrySample, TelemetrySource};

#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    Sample(TelemetrySample),
    Status(u16),
    /// Never answers; the call ends when the timeout expires.
    Hang,
}

/// Answers each address with a scripted outcome; unknown addresses hang.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<HashMap<String, Scripted>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, address: &str, outcome: Scripted) -> Self {
        self.set(address, outcome);
        self
    }

    pub fn set(&self, address: &str, outcome: Scripted) {
        self.script
            .lock()
            .unwrap()
            .insert(address.to_string(), outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn sample(value: f64) -> TelemetrySample {
    TelemetrySample {
        power: value,
        voltage: value + 200.0,
        current: value / 100.0,
        temperature_celsius: value + 20.0,
    }
}

#[async_trait::async_trait]
impl TelemetrySource for ScriptedSource {
    async fn fetch(&self, address: &str, timeout: Duration) -> DeviceResult<TelemetrySample> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(Scripted::Hang);

        match outcome {
            Scripted::Sample(sample) => Ok(sample),
            Scripted::Status(code) => Err(DeviceError::UnexpectedStatus {
                url: address.to_string(),
                code,
            }),
            Scripted::Hang => {
                tokio::time::sleep(timeout).await;
                Err(DeviceError::Timeout {
                    url: address.to_string(),
                    timeout_ms: timeout.as_millis(),
                })
            }
        }
    }
}
