//! LockIn development endpoint
//!
//! A stand-in for the LockIn API that accepts workouts and nutrition logs,
//! keeps them in memory and deduplicates redeliveries by `Idempotency-Key`.
//!
//! # Configuration
//!
//! Environment variables:
//! - `LOCKIN_ENDPOINT_PORT`: Port to listen on (default: 8000)
//! - `LOCKIN_ENDPOINT_API_KEY`: Bearer token required on `/api` routes (default: none)
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint (no auth required)
//! - `POST /api/workouts`: Accept a workout
//! - `POST /api/nutrition-logs`: Accept a nutrition log
//! - `GET /api/received`: Everything accepted so far

use std::net::SocketAddr;

use lockin::server::{router, IngestState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lockin_endpoint=info,lockin=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let port = std::env::var("LOCKIN_ENDPOINT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let api_key = std::env::var("LOCKIN_ENDPOINT_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());
    if api_key.is_none() {
        tracing::warn!("LOCKIN_ENDPOINT_API_KEY not set - /api routes are open");
    }

    let app = router(IngestState::new(api_key));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting endpoint on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
