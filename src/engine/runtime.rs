//! Timer-driven execution of the [`TelemetryScheduler`].
//!
//! One tokio task selects over two intervals, the clock tick and the sensor
//! tick, so no two ticks can ever overlap. Missed ticks are skipped rather
//! than bursted. After each tick a complete [`Snapshot`] is published on a
//! `watch` channel; readers never observe a half-updated site list.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::scheduler::{SiteForecast, Snapshot, TelemetryScheduler};
use crate::models::Reading;

// ---

/// Real-time periods of the two timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTiming {
    pub clock: Duration,
    pub sensor: Duration,
}

impl TickTiming {
    /// Clock every `clock_ms`, sensors every `sensor_every` clock ticks.
    pub fn from_cadence(clock_ms: u64, sensor_every: u64) -> Self {
        let clock = Duration::from_millis(clock_ms.max(1));
        Self {
            clock,
            sensor: clock * u32::try_from(sensor_every.max(1)).unwrap_or(u32::MAX),
        }
    }
}

/// Cheap, cloneable access to the running simulation.
#[derive(Clone)]
pub struct TelemetryHandle {
    scheduler: Arc<Mutex<TelemetryScheduler>>,
    snapshots: watch::Receiver<Snapshot>,
}

impl TelemetryHandle {
    /// Latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver notified after every tick.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// History for a site, backfilling on first inspection in lazy mode.
    pub fn inspect(&self, site_id: u32) -> Option<Vec<Reading>> {
        lock(&self.scheduler).inspect(site_id)
    }

    pub fn forecast(&self, site_id: u32) -> Option<SiteForecast> {
        lock(&self.scheduler).forecast(site_id)
    }

    /// Drop a site's history. Returns `false` for unknown sites.
    pub fn release(&self, site_id: u32) -> bool {
        let mut scheduler = lock(&self.scheduler);
        if scheduler.site(site_id).is_none() {
            return false;
        }
        scheduler.release(site_id);
        true
    }
}

struct Running {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct TelemetryRuntime {
    scheduler: Arc<Mutex<TelemetryScheduler>>,
    publisher: Arc<watch::Sender<Snapshot>>,
    handle: TelemetryHandle,
    timing: TickTiming,
    running: Option<Running>,
}

impl TelemetryRuntime {
    pub fn new(scheduler: TelemetryScheduler, timing: TickTiming) -> Self {
        // ---
        let (publisher, snapshots) = watch::channel(scheduler.snapshot());
        let scheduler = Arc::new(Mutex::new(scheduler));
        let handle = TelemetryHandle {
            scheduler: Arc::clone(&scheduler),
            snapshots,
        };

        Self {
            scheduler,
            publisher: Arc::new(publisher),
            handle,
            timing,
            running: None,
        }
    }

    pub fn handle(&self) -> TelemetryHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start both timers. A no-op when already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        // ---
        if self.running.is_some() {
            return;
        }

        let (shutdown, mut stop_rx) = watch::channel(false);
        let scheduler = Arc::clone(&self.scheduler);
        let publisher = Arc::clone(&self.publisher);
        let timing = self.timing;

        let task = tokio::spawn(async move {
            // ---
            let now = Instant::now();
            let mut clock = interval_at(now + timing.clock, timing.clock);
            let mut sensor = interval_at(now + timing.sensor, timing.sensor);
            clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
            sensor.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(
                clock_ms = timing.clock.as_millis() as u64,
                sensor_ms = timing.sensor.as_millis() as u64,
                "telemetry timers started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = clock.tick() => {
                        let snapshot = {
                            let mut s = lock(&scheduler);
                            s.advance_clock();
                            s.snapshot()
                        };
                        publisher.send_replace(snapshot);
                    }
                    _ = sensor.tick() => {
                        let snapshot = {
                            let mut s = lock(&scheduler);
                            s.sample_sensors();
                            s.snapshot()
                        };
                        publisher.send_replace(snapshot);
                    }
                }
            }

            tracing::info!("telemetry timers stopped");
        });

        self.running = Some(Running { shutdown, task });
    }

    /// Cancel both timers and wait for the task to exit.
    ///
    /// No tick runs after this returns.
    pub async fn stop(&mut self) {
        // ---
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown.send(true);
        if let Err(e) = running.task.await {
            tracing::error!("telemetry task ended abnormally: {}", e);
        }
    }
}

fn lock(scheduler: &Mutex<TelemetryScheduler>) -> MutexGuard<'_, TelemetryScheduler> {
    scheduler.lock().unwrap_or_else(PoisonError::into_inner)
}
