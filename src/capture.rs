//! Write path for new records.
//!
//! `save` only touches the local store, so it succeeds offline. Once it
//! returns an id the record is on disk and the sync machinery owns it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{RecordStore, StoreError};
use crate::models::{RecordId, RecordKind};
use crate::sync::{Reporter, SyncEvent, SyncTrigger};

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The durable write failed; nothing was stored or queued.
    #[error("Failed to save record: {0}")]
    SaveFailed(#[source] StoreError),
}

/// Capture API used by the UI layer.
#[derive(Clone)]
pub struct Capture {
    store: RecordStore,
    reporter: Reporter,
    trigger: SyncTrigger,
}

impl Capture {
    pub fn new(store: RecordStore, reporter: Reporter, trigger: SyncTrigger) -> Self {
        Self {
            store,
            reporter,
            trigger,
        }
    }

    /// Durably stores a record and returns its id.
    ///
    /// On success a pass for the same kind is requested, but not awaited.
    pub async fn save(&self, kind: RecordKind, payload: &str) -> Result<RecordId, CaptureError> {
        let id = self.store.insert(kind, payload).await.map_err(|e| {
            tracing::error!(%kind, "Failed to save record: {}", e);
            CaptureError::SaveFailed(e)
        })?;

        tracing::info!(%kind, id, "Record saved");
        self.reporter.publish(SyncEvent::RecordSaved { kind, id });
        self.trigger.trigger_kind(kind);

        Ok(id)
    }
}

/// JSON answer returned to the UI for a save request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<RecordId, CaptureError>> for SaveResponse {
    fn from(result: &Result<RecordId, CaptureError>) -> Self {
        match result {
            Ok(id) => Self {
                success: true,
                id: Some(*id),
                error: None,
            },
            Err(e) => Self {
                success: false,
                id: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::models::SyncStatus;
    use std::time::Duration;
    use tempfile::TempDir;

    struct TestContext {
        capture: Capture,
        store: RecordStore,
        reporter: Reporter,
        trigger: SyncTrigger,
        temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let store = RecordStore::new(init_db(&temp_dir.path().join("test.db")).await.unwrap());
        let reporter = Reporter::new();
        let trigger = SyncTrigger::new();
        TestContext {
            capture: Capture::new(store.clone(), reporter.clone(), trigger.clone()),
            store,
            reporter,
            trigger,
            temp_dir,
        }
    }

    #[tokio::test]
    async fn test_save_stores_pending_record() {
        let ctx = setup().await;

        let id = ctx
            .capture
            .save(RecordKind::Workout, "{\"exercise\":\"squat\"}")
            .await
            .unwrap();

        let record = ctx.store.get(RecordKind::Workout, id).await.unwrap().unwrap();
        assert_eq!(record.payload, "{\"exercise\":\"squat\"}");
        assert_eq!(record.sync_status, SyncStatus::Pending);
    }

    #[tokio::test]
    async fn test_save_publishes_event() {
        let ctx = setup().await;
        let mut events = ctx.reporter.subscribe();

        let id = ctx.capture.save(RecordKind::NutritionLog, "{}").await.unwrap();

        assert_eq!(
            events.try_recv(),
            Some(SyncEvent::RecordSaved {
                kind: RecordKind::NutritionLog,
                id
            })
        );
    }

    #[tokio::test]
    async fn test_save_requests_pass_for_its_kind() {
        let ctx = setup().await;
        ctx.capture.save(RecordKind::Workout, "{}").await.unwrap();

        tokio::time::timeout(
            Duration::from_millis(100),
            ctx.trigger.triggered(RecordKind::Workout),
        )
        .await
        .expect("workout pass should have been requested");

        assert!(tokio::time::timeout(
            Duration::from_millis(50),
            ctx.trigger.triggered(RecordKind::NutritionLog),
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn test_save_failure_stores_nothing() {
        let ctx = setup().await;
        let mut events = ctx.reporter.subscribe();
        ctx.store.close().await;

        let result = ctx.capture.save(RecordKind::Workout, "{\"lost\":true}").await;
        assert!(matches!(result, Err(CaptureError::SaveFailed(_))));
        assert!(events.try_recv().is_none());

        let reopened =
            RecordStore::new(init_db(&ctx.temp_dir.path().join("test.db")).await.unwrap());
        assert!(reopened
            .list_pending(RecordKind::Workout)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_save_response_shapes() {
        let ok: Result<RecordId, CaptureError> = Ok(12);
        let json = serde_json::to_value(SaveResponse::from(&ok)).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "id": 12 }));

        let err: Result<RecordId, CaptureError> =
            Err(CaptureError::SaveFailed(StoreError::Database(sqlx::Error::PoolClosed)));
        let response = SaveResponse::from(&err);
        assert!(!response.success);
        assert!(response.id.is_none());
        assert!(response
            .error
            .unwrap()
            .starts_with("Failed to save record"));
    }
}
