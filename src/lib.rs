//! Offline-first capture and sync engine for LockIn Fitness.
//!
//! Workouts and nutrition logs are written to a local SQLite store first and
//! delivered to the LockIn API later, in creation order, once it is
//! reachable. The [`engine::Engine`] wires the pieces together:
//!
//! - [`db::RecordStore`]: durable per-kind record tables
//! - [`capture::Capture`]: the save path used by the UI
//! - [`sync`]: reconciler, scheduler, event reporter and HTTP client
//! - [`server`]: an in-memory ingest endpoint for local development

pub mod capture;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod server;
pub mod sync;

pub use capture::{Capture, CaptureError, SaveResponse};
pub use config::Config;
pub use engine::{Engine, EngineError};
pub use models::{Record, RecordId, RecordKind, StatusCounts, SyncStatus};
