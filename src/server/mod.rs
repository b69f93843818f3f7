//! Development ingest server for the LockIn API.

pub mod ingest;

pub use ingest::{router, IngestResponse, IngestState, ReceivedRecord};
