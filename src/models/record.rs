use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::record_kind::RecordKind;

/// Store-assigned record identifier, unique within a kind and never reused.
pub type RecordId = i64;

/// Delivery state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Not yet acknowledged by the remote endpoint.
    Pending,
    /// Acknowledged by the remote endpoint. Terminal.
    Synced,
    /// Parked after repeated rejections; skipped by passes until requeued.
    Quarantined,
}

impl SyncStatus {
    /// Integer flag persisted in the `sync_status` column.
    pub fn flag(&self) -> i64 {
        match self {
            SyncStatus::Pending => 0,
            SyncStatus::Synced => 1,
            SyncStatus::Quarantined => 2,
        }
    }

    pub fn from_flag(flag: i64) -> Option<Self> {
        match flag {
            0 => Some(SyncStatus::Pending),
            1 => Some(SyncStatus::Synced),
            2 => Some(SyncStatus::Quarantined),
            _ => None,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Quarantined => write!(f, "quarantined"),
        }
    }
}

/// A captured user event as persisted in the local store.
///
/// The payload is opaque to the engine and never changes after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub kind: RecordKind,
    pub payload: String,
    pub sync_status: SyncStatus,
    pub attempts: i64,
    pub rejections: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncStatus::Pending
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} [{}] {}",
            self.id,
            self.kind,
            self.sync_status,
            self.created_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        if self.attempts > 0 {
            write!(f, " ({} failed attempt", self.attempts)?;
            if self.attempts != 1 {
                write!(f, "s")?;
            }
            write!(f, ")")?;
        }
        if let Some(err) = &self.last_error {
            write!(f, " last error: {}", err)?;
        }
        Ok(())
    }
}

/// Per-status record counts for one kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub synced: i64,
    pub quarantined: i64,
}
