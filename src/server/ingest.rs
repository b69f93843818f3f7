//! In-memory ingest endpoint that mirrors the LockIn API surface.
//!
//! Accepted records are kept in memory and deduplicated by idempotency key,
//! so redelivery after a crash shows up as a `200` duplicate instead of a
//! second record.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::models::RecordKind;
use crate::sync::IDEMPOTENCY_HEADER;

/// A record accepted by the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedRecord {
    pub kind: RecordKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct IngestLog {
    seen: HashSet<String>,
    received: Vec<ReceivedRecord>,
}

/// Shared state for the ingest routes.
#[derive(Clone)]
pub struct IngestState {
    api_key: Option<Arc<str>>,
    log: Arc<RwLock<IngestLog>>,
}

impl IngestState {
    /// With `api_key` set, every `/api` route requires `Authorization: Bearer <key>`.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.map(Arc::from),
            log: Arc::new(RwLock::new(IngestLog::default())),
        }
    }

    /// Records accepted so far, in arrival order.
    pub async fn received(&self) -> Vec<ReceivedRecord> {
        self.log.read().await.received.clone()
    }

    /// Stores a record unless its key was seen before. Returns whether it was new.
    async fn accept(&self, record: ReceivedRecord) -> bool {
        let mut log = self.log.write().await;
        if let Some(key) = &record.idempotency_key {
            if !log.seen.insert(key.clone()) {
                return false;
            }
        }
        log.received.push(record);
        true
    }
}

/// JSON error body, shared by auth and validation failures
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error,
            message: message.into(),
        }),
    )
        .into_response()
}

async fn auth_middleware(
    State(state): State<IngestState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match auth_header {
        Some(h) if h.strip_prefix("Bearer ") == Some(expected) => next.run(request).await,
        Some(h) if h.starts_with("Bearer ") => {
            error_response(StatusCode::UNAUTHORIZED, "invalid_key", "Invalid API key")
        }
        Some(_) => error_response(
            StatusCode::UNAUTHORIZED,
            "invalid_auth",
            "Authorization header must use Bearer scheme",
        ),
        None => error_response(
            StatusCode::UNAUTHORIZED,
            "missing_auth",
            "Authorization header required",
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub kind: RecordKind,
    pub duplicate: bool,
}

async fn ingest(state: IngestState, kind: RecordKind, headers: HeaderMap, body: Bytes) -> Response {
    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(%kind, "Rejected non-JSON payload: {}", e);
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_payload",
                format!("Payload is not valid JSON: {}", e),
            );
        }
    };

    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let record = ReceivedRecord {
        kind,
        idempotency_key: idempotency_key.clone(),
        payload,
        received_at: Utc::now(),
    };

    if state.accept(record).await {
        tracing::info!(%kind, key = ?idempotency_key, "Record accepted");
        (
            StatusCode::CREATED,
            Json(IngestResponse {
                kind,
                duplicate: false,
            }),
        )
            .into_response()
    } else {
        tracing::info!(%kind, key = ?idempotency_key, "Duplicate delivery ignored");
        (
            StatusCode::OK,
            Json(IngestResponse {
                kind,
                duplicate: true,
            }),
        )
            .into_response()
    }
}

async fn ingest_workout(
    State(state): State<IngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    ingest(state, RecordKind::Workout, headers, body).await
}

async fn ingest_nutrition_log(
    State(state): State<IngestState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    ingest(state, RecordKind::NutritionLog, headers, body).await
}

async fn received(State(state): State<IngestState>) -> Json<Vec<ReceivedRecord>> {
    Json(state.received().await)
}

/// Builds the endpoint's router.
pub fn router(state: IngestState) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let api_routes = Router::new()
        .route(RecordKind::Workout.endpoint_path(), post(ingest_workout))
        .route(
            RecordKind::NutritionLog.endpoint_path(),
            post(ingest_nutrition_log),
        )
        .route("/api/received", get(received))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn(state: IngestState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_health() {
        let url = spawn(IngestState::new(Some("secret".to_string()))).await;

        let response = reqwest::get(format!("{}/health", url)).await.unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_accepts_then_deduplicates() {
        let state = IngestState::new(None);
        let url = spawn(state.clone()).await;
        let client = reqwest::Client::new();

        let send = || {
            client
                .post(format!("{}/api/workouts", url))
                .header(IDEMPOTENCY_HEADER, "install:workout:1")
                .body("{\"reps\":10}")
                .send()
        };

        let first = send().await.unwrap();
        assert_eq!(first.status(), 201);
        let body: IngestResponse = first.json().await.unwrap();
        assert!(!body.duplicate);

        let second = send().await.unwrap();
        assert_eq!(second.status(), 200);
        let body: IngestResponse = second.json().await.unwrap();
        assert!(body.duplicate);

        let received = state.received().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].kind, RecordKind::Workout);
        assert_eq!(received[0].payload["reps"], 10);
    }

    #[tokio::test]
    async fn test_same_key_different_kinds_are_distinct() {
        let state = IngestState::new(None);
        let url = spawn(state.clone()).await;
        let client = reqwest::Client::new();

        for path in ["/api/workouts", "/api/nutrition-logs"] {
            let response = client
                .post(format!("{}{}", url, path))
                .header(IDEMPOTENCY_HEADER, format!("install:{}:1", path))
                .body("{}")
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 201);
        }

        let kinds: Vec<RecordKind> = state.received().await.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RecordKind::Workout, RecordKind::NutritionLog]);
    }

    #[tokio::test]
    async fn test_rejects_invalid_json() {
        let state = IngestState::new(None);
        let url = spawn(state.clone()).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/nutrition-logs", url))
            .body("not json")
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 422);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "invalid_payload");
        assert!(state.received().await.is_empty());
    }

    #[tokio::test]
    async fn test_requires_bearer_token_when_configured() {
        let url = spawn(IngestState::new(Some("secret".to_string()))).await;
        let client = reqwest::Client::new();

        let missing = client
            .post(format!("{}/api/workouts", url))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 401);
        let body: serde_json::Value = missing.json().await.unwrap();
        assert_eq!(body["error"], "missing_auth");

        let wrong = client
            .post(format!("{}/api/workouts", url))
            .bearer_auth("nope")
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status(), 401);
        let body: serde_json::Value = wrong.json().await.unwrap();
        assert_eq!(body["error"], "invalid_key");

        let ok = client
            .post(format!("{}/api/workouts", url))
            .bearer_auth("secret")
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status(), 201);
    }

    #[tokio::test]
    async fn test_received_lists_records() {
        let state = IngestState::new(None);
        let url = spawn(state).await;
        let client = reqwest::Client::new();

        client
            .post(format!("{}/api/workouts", url))
            .body("{\"exercise\":\"row\"}")
            .send()
            .await
            .unwrap();

        let list: Vec<ReceivedRecord> = client
            .get(format!("{}/api/received", url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].payload["exercise"], "row");
        assert!(list[0].idempotency_key.is_none());
    }
}
