//! Delivery of captured records to the remote API.
//!
//! - [`Reconciler`] runs ordered, halt-on-failure passes per record kind
//! - [`Scheduler`] drives passes on a timer and on demand
//! - [`Reporter`] publishes outcomes to any number of subscribers
//! - [`HttpEndpoint`] is the production [`Endpoint`]
//!
//! Delivery is at-least-once: a record is marked synced only after the
//! endpoint acknowledged it, so a crash between the two resends it. Every
//! request carries an idempotency key for the endpoint to deduplicate on.

pub mod client;
pub mod error;
pub mod reconciler;
pub mod reporter;
pub mod scheduler;

pub use client::{Endpoint, HttpEndpoint, IDEMPOTENCY_HEADER};
pub use error::DeliveryError;
pub use reconciler::{PassOutcome, PassReport, Reconciler, ReconcilerSettings};
pub use reporter::{Reporter, Subscription, SyncEvent};
pub use scheduler::{Scheduler, SchedulerSettings, SyncTrigger};
