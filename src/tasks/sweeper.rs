//! Expiry Sweeper
//!
//! Background task that periodically evicts entries whose expiry instant has
//! passed.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::cache::{ExpiredRecord, ExpiryIndex, RegionStore, StatsRecorder};
use crate::clock::Clock;
use crate::error::{CacheError, Result};
use crate::fault::FaultReporter;

/// Name given to the OS thread used when no tokio runtime is available.
pub const SWEEPER_THREAD_NAME: &str = "region-cache-sweeper";

// == Sweep Report ==
/// Outcome of one sweep pass.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Expired records observed by the pass
    pub expired: usize,
    /// Entries actually evicted
    pub removed: usize,
    /// Entries rewritten after the pass began, left for a later pass
    pub deferred: usize,
    /// Pairs whose eviction raised a fault
    pub faults: usize,
    pub finished_at: DateTime<Utc>,
}

// == Sweeper ==
/// Evicts expired entries from a [`RegionStore`].
///
/// Passes never overlap: a pass that finds another one running is skipped,
/// not queued. Removal goes through the store's conditional path, so an entry
/// rewritten after a pass began is left alone by that pass.
pub struct Sweeper<V: ?Sized> {
    store: Arc<RegionStore<V>>,
    expiry: Arc<ExpiryIndex>,
    clock: Arc<dyn Clock>,
    reporter: Option<Arc<dyn FaultReporter>>,
    stats: Arc<StatsRecorder>,
    gate: Mutex<()>,
}

impl<V: ?Sized + Send + Sync + 'static> Sweeper<V> {
    pub fn new(
        store: Arc<RegionStore<V>>,
        expiry: Arc<ExpiryIndex>,
        clock: Arc<dyn Clock>,
        reporter: Option<Arc<dyn FaultReporter>>,
        stats: Arc<StatsRecorder>,
    ) -> Self {
        Self {
            store,
            expiry,
            clock,
            reporter,
            stats,
            gate: Mutex::new(()),
        }
    }

    // == Run Pass ==
    /// Runs one sweep pass now.
    ///
    /// Returns `None` when another pass holds the gate.
    pub fn run_pass(&self) -> Option<SweepReport> {
        let Ok(_pass) = self.gate.try_lock() else {
            self.stats.record_skipped_pass();
            warn!("Sweep pass skipped: previous pass still running");
            return None;
        };

        let pass_seq = self.store.current_seq();
        let expired = self.expiry.sweep_expired(self.clock.now());

        let mut removed = 0;
        let mut deferred = 0;
        let mut faults = 0;
        for record in &expired {
            match panic::catch_unwind(AssertUnwindSafe(|| self.evict(record, pass_seq))) {
                Ok(Eviction::Removed) => removed += 1,
                Ok(Eviction::Deferred) => deferred += 1,
                Ok(Eviction::Missing) => {}
                Err(payload) => {
                    faults += 1;
                    self.stats.record_fault();
                    let fault = CacheError::RemovalPanicked {
                        region: record.key.region().to_string(),
                        key: record.key.key().to_string(),
                        message: panic_message(&*payload),
                    };
                    if let Some(reporter) = &self.reporter {
                        reporter.report(&fault);
                    }
                }
            }
        }

        let finished_at = Utc::now();
        self.stats.record_expired(removed as u64);
        self.stats.record_pass(finished_at);

        let report = SweepReport {
            expired: expired.len(),
            removed,
            deferred,
            faults,
            finished_at,
        };

        if report.removed > 0 || report.faults > 0 {
            info!(
                removed = report.removed,
                faults = report.faults,
                "Sweep: evicted {} expired entries",
                report.removed
            );
        } else {
            debug!(expired = report.expired, "Sweep: no entries evicted");
        }

        Some(report)
    }

    /// Evicts one expired pair.
    ///
    /// The record is retired unless the entry was rewritten after the pass
    /// began; the next pass picks that entry up.
    fn evict(&self, record: &ExpiredRecord, pass_seq: u64) -> Eviction {
        let entry = &record.key;
        match self.store.remove_if_written_before(entry, pass_seq) {
            Some(value) => {
                self.expiry.retire(record);
                drop(value);
                Eviction::Removed
            }
            None if self.store.contains(entry.region(), entry.key()) => Eviction::Deferred,
            None => {
                self.expiry.retire(record);
                Eviction::Missing
            }
        }
    }

    // == Spawn ==
    /// Starts the periodic schedule.
    ///
    /// Runs as a task on the current tokio runtime when called from one,
    /// otherwise on a dedicated thread.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> Result<SweeperHandle> {
        match Handle::try_current() {
            Ok(runtime) => {
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                let task = runtime.spawn(self.run(interval, shutdown_rx));
                Ok(SweeperHandle::new(shutdown_tx, Worker::Task(task)))
            }
            Err(_) => self.spawn_on_thread(interval),
        }
    }

    /// Starts the periodic schedule on a dedicated thread driving its own
    /// current-thread runtime.
    pub fn spawn_on_thread(self: Arc<Self>, interval: Duration) -> Result<SweeperHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let thread = std::thread::Builder::new()
            .name(SWEEPER_THREAD_NAME.to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build();
                match runtime {
                    Ok(runtime) => runtime.block_on(self.run(interval, shutdown_rx)),
                    Err(e) => error!(error = %e, "Failed to build sweeper runtime"),
                }
            })?;
        Ok(SweeperHandle::new(shutdown_tx, Worker::Thread(thread)))
    }

    async fn run(self: Arc<Self>, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(
            "Starting expiry sweeper with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_pass();
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Expiry sweeper stopped");
    }
}

enum Eviction {
    Removed,
    Deferred,
    Missing,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// == Sweeper Handle ==
enum Worker {
    Task(JoinHandle<()>),
    Thread(std::thread::JoinHandle<()>),
}

/// Controls a running sweeper. Dropping the handle stops the schedule.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    worker: Worker,
}

impl SweeperHandle {
    fn new(shutdown_tx: watch::Sender<bool>, worker: Worker) -> Self {
        Self {
            shutdown_tx,
            worker,
        }
    }

    /// Signals the schedule to stop after the current pass.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// True once the schedule has exited.
    pub fn is_finished(&self) -> bool {
        match &self.worker {
            Worker::Task(task) => task.is_finished(),
            Worker::Thread(thread) => thread.is_finished(),
        }
    }

    /// True when the schedule runs on its own OS thread.
    pub fn is_dedicated_thread(&self) -> bool {
        matches!(self.worker, Worker::Thread(_))
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SweeperHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweeperHandle")
            .field("dedicated_thread", &self.is_dedicated_thread())
            .field("finished", &self.is_finished())
            .finish()
    }
}
