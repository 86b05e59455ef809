//! Fixed-cadence driver for the poll cycle.
//!
//! The scheduler runs a cycle immediately, then waits out the remainder of the
//! interval. Both the cycle and the wait end as soon as the shutdown token is
//! cancelled. Device errors never stop it.

use std::fmt;

use tokio::{
    sync::watch,
    time::{sleep, Duration, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::poller::PollCycle;

/// Lifecycle of a scheduler: `Idle -> Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, `run` not called yet.
    Idle,
    Running,
    /// Shutdown was requested; terminal.
    Stopped,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Idle => "Idle",
            SchedulerState::Running => "Running",
            SchedulerState::Stopped => "Stopped",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Scheduler {
    cycle: PollCycle,
    interval: Duration,
    state_tx: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(cycle: PollCycle, interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(SchedulerState::Idle);
        Self {
            cycle,
            interval,
            state_tx,
        }
    }

    /// Returns a receiver observing state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: SchedulerState) {
        let old_state = self.state_tx.send_replace(state);
        debug!("Scheduler state changed: {} -> {}", old_state, state);
    }

    /// Polls until `shutdown` is cancelled and returns the number of cycles
    /// that ran to completion.
    pub async fn run(self, shutdown: CancellationToken) -> u64 {
        self.set_state(SchedulerState::Running);
        info!(
            "Polling {} device(s) every {}s",
            self.cycle.devices().len(),
            self.interval.as_secs_f64()
        );

        let mut completed = 0u64;
        while !shutdown.is_cancelled() {
            let start = Instant::now();
            let report = self.cycle.run_once(&shutdown).await;
            if report.cancelled > 0 {
                break;
            }
            completed += 1;

            let elapsed = start.elapsed();
            debug!(
                "Poll cycle {} finished in {:?}: {} ok, {} failed",
                completed, elapsed, report.succeeded, report.failed
            );
            if elapsed > self.interval {
                warn!(
                    "Poll cycle took {:?}, longer than the {:?} interval",
                    elapsed, self.interval
                );
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.interval.saturating_sub(elapsed)) => {}
            }
        }

        self.set_state(SchedulerState::Stopped);
        info!("Polling stopped after {} cycle(s)", completed);
        completed
    }
}
