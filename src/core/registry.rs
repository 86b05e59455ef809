//! Latest-sample store shared between the poller and the exposure server.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{PoisonError, RwLock},
};

use super::device::TelemetrySample;

/// Thread-safe map from device name to its most recent telemetry sample.
///
/// A single structure-wide lock serialises writers against readers, so a
/// snapshot always sees each device's sample either entirely before or
/// entirely after a concurrent `update`. Entries are created on first success
/// and never removed.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    samples: RwLock<HashMap<String, TelemetrySample>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces (or creates) the stored sample for `name`.
    pub fn update(&self, name: &str, sample: TelemetrySample) {
        // A writer cannot leave a half-written `Copy` value behind, so the data
        // behind a poisoned lock is still consistent.
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        match samples.get_mut(name) {
            Some(slot) => *slot = sample,
            None => {
                samples.insert(name.to_string(), sample);
            }
        }
    }

    /// Returns a consistent copy of every stored sample, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, TelemetrySample> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        samples
            .iter()
            .map(|(name, sample)| (name.clone(), *sample))
            .collect()
    }

    /// Returns the stored sample for `name`, if the device ever reported.
    pub fn get(&self, name: &str) -> Option<TelemetrySample> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        samples.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.samples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use super::*;

    fn uniform(value: f64) -> TelemetrySample {
        TelemetrySample {
            power: value,
            voltage: value,
            current: value,
            temperature_celsius: value,
        }
    }

    #[test]
    fn empty_registry_has_no_entries() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.get("dev1"), None);
    }

    #[test]
    fn update_creates_then_replaces() {
        let registry = MetricsRegistry::new();
        registry.update("dev1", uniform(1.0));
        assert_eq!(registry.get("dev1"), Some(uniform(1.0)));

        registry.update("dev1", uniform(2.0));
        assert_eq!(registry.get("dev1"), Some(uniform(2.0)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_is_sorted_and_detached() {
        let registry = MetricsRegistry::new();
        registry.update("kitchen", uniform(3.0));
        registry.update("attic", uniform(1.0));
        registry.update("boiler", uniform(2.0));

        let snapshot = registry.snapshot();
        let names: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(names, ["attic", "boiler", "kitchen"]);

        registry.update("attic", uniform(9.0));
        assert_eq!(snapshot["attic"], uniform(1.0));
    }

    #[test]
    fn duplicate_names_overwrite_the_same_entry() {
        let registry = MetricsRegistry::new();
        registry.update("plug", uniform(1.0));
        registry.update("plug", uniform(5.0));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("plug"), Some(uniform(5.0)));
    }

    #[test]
    fn concurrent_snapshots_never_observe_mixed_samples() {
        let registry = Arc::new(MetricsRegistry::new());
        registry.update("dev1", uniform(0.0));
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let registry = registry.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut value = 0.0;
                while !stop.load(Ordering::Relaxed) {
                    value += 1.0;
                    registry.update("dev1", uniform(value));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..5_000 {
                        let sample = registry.snapshot()["dev1"];
                        assert_eq!(sample.power, sample.voltage);
                        assert_eq!(sample.power, sample.current);
                        assert_eq!(sample.power, sample.temperature_celsius);
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
    }
}
