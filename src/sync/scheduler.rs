//! Background driver for delivery passes.
//!
//! One worker task per record kind waits for either the periodic tick or a
//! manual trigger, then runs a pass. A worker only runs one pass at a time,
//! and triggers that arrive while it is busy collapse into a single
//! follow-up pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::client::Endpoint;
use super::reconciler::Reconciler;
use crate::models::RecordKind;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Timing of scheduled passes.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Delay before the first pass after start.
    pub startup_delay: Duration,
    /// Period between scheduled passes.
    pub interval: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            startup_delay: Duration::from_secs(60),
            interval: Duration::from_secs(300),
        }
    }
}

/// Handle for requesting out-of-band passes.
///
/// Each kind holds at most one outstanding request, so any number of
/// triggers fired while a pass is running result in exactly one more pass.
#[derive(Clone, Default)]
pub struct SyncTrigger {
    signals: Arc<[Notify; 2]>,
}

impl SyncTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a pass for every kind.
    pub fn trigger_now(&self) {
        for kind in RecordKind::ALL {
            self.trigger_kind(kind);
        }
    }

    /// Requests a pass for one kind.
    pub fn trigger_kind(&self, kind: RecordKind) {
        self.signals[kind.index()].notify_one();
    }

    pub(crate) async fn triggered(&self, kind: RecordKind) {
        self.signals[kind.index()].notified().await;
    }
}

/// Running scheduler.
///
/// The workers live as long as this handle. Dropping it stops them the same
/// way [`Scheduler::shutdown`] does, without waiting for them to exit.
#[must_use = "dropping the scheduler stops its workers"]
pub struct Scheduler {
    trigger: SyncTrigger,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawns one worker per kind on the current tokio runtime.
    ///
    /// The grace delay only applies to the periodic cadence. A request made
    /// through `trigger`, including one stored before the scheduler started,
    /// runs a pass right away.
    pub fn start<E: Endpoint + 'static>(
        reconciler: Arc<Reconciler<E>>,
        trigger: SyncTrigger,
        mut settings: SchedulerSettings,
    ) -> Self {
        // tokio rejects a zero period
        settings.interval = settings.interval.max(MIN_INTERVAL);
        let (shutdown, _) = watch::channel(false);

        let workers = RecordKind::ALL
            .iter()
            .map(|&kind| {
                tokio::spawn(run_worker(
                    kind,
                    reconciler.clone(),
                    trigger.clone(),
                    settings.clone(),
                    shutdown.subscribe(),
                ))
            })
            .collect();

        tracing::info!(
            "Sync scheduler started (first pass in {}s, then every {}s)",
            settings.startup_delay.as_secs(),
            settings.interval.as_secs()
        );

        Self {
            trigger,
            shutdown,
            workers,
        }
    }

    /// Requests an immediate pass for every kind without resetting the
    /// periodic cadence.
    pub fn trigger_now(&self) {
        self.trigger.trigger_now();
    }

    pub fn trigger(&self) -> SyncTrigger {
        self.trigger.clone()
    }

    /// Stops all workers. A delivery in flight is abandoned and its record
    /// stays pending.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::warn!("Sync worker ended abnormally: {}", e);
            }
        }
        tracing::info!("Sync scheduler stopped");
    }
}

async fn run_worker<E: Endpoint>(
    kind: RecordKind,
    reconciler: Arc<Reconciler<E>>,
    trigger: SyncTrigger,
    settings: SchedulerSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(
        Instant::now() + settings.startup_delay,
        settings.interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                tracing::debug!(%kind, "Scheduled sync pass");
            }
            _ = trigger.triggered(kind) => {
                tracing::debug!(%kind, "Triggered sync pass");
            }
        }

        tokio::select! {
            _ = reconciler.run_pass(kind) => {}
            _ = shutdown.changed() => {
                tracing::info!(%kind, "Abandoning in-flight sync pass");
                break;
            }
        }
    }
}
