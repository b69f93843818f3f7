//! Per-kind delivery passes.
//!
//! A pass snapshots the pending set of one kind, then walks it oldest first,
//! delivering each record and marking it synced before moving on. The first
//! failure ends the pass so a user's history is never delivered out of order.
//! Records that keep getting rejected are moved to quarantine once they reach
//! the configured limit, which lets the rest of the queue drain.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use super::client::Endpoint;
use super::error::DeliveryError;
use super::reporter::{Reporter, SyncEvent};
use crate::db::{FailureCount, RecordStore, StoreError};
use crate::models::{Record, RecordId, RecordKind};

/// Tunables for delivery passes.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Upper bound on a single delivery call.
    pub delivery_timeout: Duration,
    /// Rejections after which a record is quarantined. `0` never quarantines.
    pub quarantine_after: u32,
    /// Records loaded from the store per page.
    pub batch_size: i64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            delivery_timeout: Duration::from_secs(30),
            quarantine_after: 5,
            batch_size: 50,
        }
    }
}

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassOutcome {
    /// Nothing was pending.
    Idle,
    /// Every record in the snapshot was synced or quarantined.
    Completed,
    /// Delivery of `record_id` failed; it and everything after it stay pending.
    Halted { record_id: RecordId, error: String },
    /// The local store failed mid-pass.
    StoreFailed { error: String },
}

/// Summary of one pass over one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub kind: RecordKind,
    pub synced: usize,
    pub quarantined: Vec<RecordId>,
    pub outcome: PassOutcome,
}

impl PassReport {
    fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            synced: 0,
            quarantined: Vec::new(),
            outcome: PassOutcome::Idle,
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, PassOutcome::Idle | PassOutcome::Completed)
    }

    pub fn error(&self) -> Option<String> {
        match &self.outcome {
            PassOutcome::Halted { error, .. } | PassOutcome::StoreFailed { error } => {
                Some(error.clone())
            }
            _ => None,
        }
    }
}

/// Drives delivery of pending records to an [`Endpoint`].
pub struct Reconciler<E> {
    store: RecordStore,
    endpoint: E,
    reporter: Reporter,
    settings: ReconcilerSettings,
    /// One lock per kind so passes for the same kind never overlap
    in_flight: [Mutex<()>; 2],
}

impl<E: Endpoint> Reconciler<E> {
    pub fn new(
        store: RecordStore,
        endpoint: E,
        reporter: Reporter,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            endpoint,
            reporter,
            settings,
            in_flight: [Mutex::new(()), Mutex::new(())],
        }
    }

    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Runs one pass for every kind concurrently.
    pub async fn run_all(&self) -> Vec<PassReport> {
        futures::future::join_all(RecordKind::ALL.iter().map(|&kind| self.run_pass(kind))).await
    }

    /// Runs one pass for `kind`, waiting for any pass already in flight for
    /// the same kind to finish first.
    ///
    /// Delivery failures never surface as errors here; they are reflected in
    /// the report and published as a `SyncCompleted` event.
    pub async fn run_pass(&self, kind: RecordKind) -> PassReport {
        let _guard = self.in_flight[kind.index()].lock().await;

        let mut report = PassReport::new(kind);
        if let Err(e) = self.deliver_pending(kind, &mut report).await {
            tracing::error!(%kind, "Sync pass aborted: {}", e);
            report.outcome = PassOutcome::StoreFailed {
                error: e.to_string(),
            };
        }

        match &report.outcome {
            PassOutcome::Idle => {
                tracing::debug!(%kind, "Nothing to sync");
                return report;
            }
            PassOutcome::Completed => {
                tracing::info!(%kind, synced = report.synced, "Sync pass complete");
            }
            PassOutcome::Halted { record_id, error } => {
                tracing::warn!(
                    %kind,
                    synced = report.synced,
                    record_id,
                    "Sync pass halted, will retry: {}",
                    error
                );
            }
            PassOutcome::StoreFailed { .. } => {}
        }

        self.reporter.publish(SyncEvent::SyncCompleted {
            kind,
            success: report.success(),
            synced: report.synced,
            error: report.error(),
        });

        report
    }

    async fn deliver_pending(
        &self,
        kind: RecordKind,
        report: &mut PassReport,
    ) -> Result<(), StoreError> {
        // Records inserted after this point wait for the next pass
        let Some(high_water) = self.store.high_water_mark(kind).await? else {
            return Ok(());
        };
        report.outcome = PassOutcome::Completed;

        let mut after = 0;
        loop {
            let page = self
                .store
                .pending_page(kind, after, high_water, self.settings.batch_size)
                .await?;
            if page.is_empty() {
                return Ok(());
            }

            for record in &page {
                after = record.id;

                match self.deliver(record).await {
                    Ok(()) => {
                        self.store.mark_synced(kind, record.id).await?;
                        report.synced += 1;
                        tracing::debug!(%kind, id = record.id, "Record synced");
                    }
                    Err(error) => {
                        let rejected = !error.is_transient();
                        let message = error.to_string();
                        let count = self
                            .store
                            .record_failure(kind, record.id, &message, rejected)
                            .await?;

                        if rejected && self.should_quarantine(count) {
                            self.quarantine(record, &message, report).await?;
                            continue;
                        }

                        report.outcome = PassOutcome::Halted {
                            record_id: record.id,
                            error: message,
                        };
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn deliver(&self, record: &Record) -> Result<(), DeliveryError> {
        let timeout = self.settings.delivery_timeout;
        match tokio::time::timeout(timeout, self.endpoint.deliver(record)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        }
    }

    fn should_quarantine(&self, count: Option<FailureCount>) -> bool {
        let limit = i64::from(self.settings.quarantine_after);
        limit > 0 && count.is_some_and(|c| c.rejections >= limit)
    }

    async fn quarantine(
        &self,
        record: &Record,
        reason: &str,
        report: &mut PassReport,
    ) -> Result<(), StoreError> {
        if self.store.quarantine(record.kind, record.id, reason).await? {
            tracing::warn!(
                kind = %record.kind,
                id = record.id,
                "Record quarantined after {} rejection(s): {}",
                self.settings.quarantine_after,
                reason
            );
            report.quarantined.push(record.id);
            self.reporter.publish(SyncEvent::RecordQuarantined {
                kind: record.kind,
                id: record.id,
                reason: reason.to_string(),
            });
        }
        Ok(())
    }
}
