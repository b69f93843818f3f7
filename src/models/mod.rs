mod record;
mod record_kind;

pub use record::{Record, RecordId, StatusCounts, SyncStatus};
pub use record_kind::RecordKind;
