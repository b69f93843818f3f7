//! Engine bootstrap.
//!
//! [`Engine`] builds every component from one store handle and owns their
//! wiring. Nothing in the crate keeps global state; callers construct an
//! engine at startup and pass references to it around.

use std::sync::Arc;

use thiserror::Error;

use crate::capture::Capture;
use crate::config::Config;
use crate::db::{init_db, RecordStore, StoreError};
use crate::models::RecordKind;
use crate::sync::{
    Endpoint, HttpEndpoint, PassReport, Reconciler, ReconcilerSettings, Reporter, Scheduler,
    SchedulerSettings, Subscription, SyncTrigger,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct Engine<E = HttpEndpoint> {
    store: RecordStore,
    reporter: Reporter,
    trigger: SyncTrigger,
    capture: Capture,
    reconciler: Arc<Reconciler<E>>,
    scheduler_settings: SchedulerSettings,
}

impl Engine<HttpEndpoint> {
    /// Opens the configured database and prepares delivery to the configured API.
    pub async fn open(config: &Config) -> Result<Self, EngineError> {
        let pool = init_db(&config.database_path.value).await?;
        let store = RecordStore::new(pool);
        let installation_id = store.installation_id().await?;

        let settings = config.sync.reconciler_settings();
        let endpoint = HttpEndpoint::new(
            config.sync.api_url.clone(),
            config.sync.api_key.clone(),
            installation_id,
            settings.delivery_timeout,
        )?;

        tracing::debug!(
            "Engine opened (installation {}, api {})",
            installation_id,
            endpoint.api_url()
        );

        Ok(Self::with_endpoint(
            store,
            endpoint,
            settings,
            config.sync.scheduler_settings(),
        ))
    }
}

impl<E: Endpoint + 'static> Engine<E> {
    pub fn with_endpoint(
        store: RecordStore,
        endpoint: E,
        reconciler_settings: ReconcilerSettings,
        scheduler_settings: SchedulerSettings,
    ) -> Self {
        let reporter = Reporter::new();
        let trigger = SyncTrigger::new();
        let capture = Capture::new(store.clone(), reporter.clone(), trigger.clone());
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            endpoint,
            reporter.clone(),
            reconciler_settings,
        ));

        Self {
            store,
            reporter,
            trigger,
            capture,
            reconciler,
            scheduler_settings,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub fn subscribe(&self) -> Subscription {
        self.reporter.subscribe()
    }

    pub fn trigger(&self) -> SyncTrigger {
        self.trigger.clone()
    }

    /// Runs one pass for every kind and waits for it.
    pub async fn sync_now(&self) -> Vec<PassReport> {
        self.reconciler.run_all().await
    }

    /// Runs one pass for a single kind and waits for it.
    pub async fn sync_kind(&self, kind: RecordKind) -> PassReport {
        self.reconciler.run_pass(kind).await
    }

    /// Starts background passes. Saves made through [`Engine::capture`] wake
    /// the scheduler for their kind.
    pub fn start_scheduler(&self) -> Scheduler {
        Scheduler::start(
            self.reconciler.clone(),
            self.trigger.clone(),
            self.scheduler_settings.clone(),
        )
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
