use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use super::StoreError;
use crate::models::{Record, RecordId, RecordKind, StatusCounts, SyncStatus};

const COLUMNS: &str =
    "id, payload, sync_status, attempts, rejections, last_error, created_at, synced_at";

/// Durable local store for captured records.
///
/// Cloning is cheap and every clone shares the same connection pool. All
/// status changes are single statements, so a concurrent reader sees a
/// record either before or after a transition, never in between.
#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

/// Failure counters of a record after a failed delivery was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureCount {
    pub attempts: i64,
    pub rejections: i64,
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: i64,
    payload: String,
    sync_status: i64,
    attempts: i64,
    rejections: i64,
    last_error: Option<String>,
    created_at: String,
    synced_at: Option<String>,
}

impl RecordRow {
    fn into_record(self, kind: RecordKind) -> Result<Record, StoreError> {
        let sync_status =
            SyncStatus::from_flag(self.sync_status).ok_or_else(|| StoreError::Corrupt {
                table: kind.table(),
                reason: format!(
                    "record {} has unknown sync_status {}",
                    self.id, self.sync_status
                ),
            })?;

        let synced_at = match self.synced_at {
            Some(ts) => Some(parse_timestamp(kind, &ts)?),
            None => None,
        };

        Ok(Record {
            id: self.id,
            kind,
            payload: self.payload,
            sync_status,
            attempts: self.attempts,
            rejections: self.rejections,
            last_error: self.last_error,
            created_at: parse_timestamp(kind, &self.created_at)?,
            synced_at,
        })
    }
}

fn timestamp(dt: DateTime<Utc>) -> String {
    // Fixed width so stored timestamps compare correctly as text
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(kind: RecordKind, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table: kind.table(),
            reason: format!("invalid timestamp '{}': {}", value, e),
        })
}

impl RecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a new pending record and return its id.
    ///
    /// The row is committed before this returns.
    pub async fn insert(&self, kind: RecordKind, payload: &str) -> Result<RecordId, StoreError> {
        let sql = format!(
            "INSERT INTO {} (payload, sync_status, created_at) VALUES (?, ?, ?)",
            kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(payload)
            .bind(SyncStatus::Pending.flag())
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, kind: RecordKind, id: RecordId) -> Result<Option<Record>, StoreError> {
        let sql = format!("SELECT {} FROM {} WHERE id = ?", COLUMNS, kind.table());

        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_record(kind)).transpose()
    }

    /// Snapshot of all pending records of a kind, oldest first.
    pub async fn list_pending(&self, kind: RecordKind) -> Result<Vec<Record>, StoreError> {
        self.list_by_status(kind, SyncStatus::Pending).await
    }

    pub async fn list_quarantined(&self, kind: RecordKind) -> Result<Vec<Record>, StoreError> {
        self.list_by_status(kind, SyncStatus::Quarantined).await
    }

    async fn list_by_status(
        &self,
        kind: RecordKind,
        status: SyncStatus,
    ) -> Result<Vec<Record>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE sync_status = ? ORDER BY id",
            COLUMNS,
            kind.table()
        );

        let rows: Vec<RecordRow> = sqlx::query_as(&sql)
            .bind(status.flag())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.into_record(kind)).collect()
    }

    /// Highest id among the currently pending records of a kind.
    ///
    /// Together with [`RecordStore::pending_page`] this pins a pass to the
    /// pending set as it was when the pass started.
    pub async fn high_water_mark(&self, kind: RecordKind) -> Result<Option<RecordId>, StoreError> {
        let sql = format!(
            "SELECT MAX(id) FROM {} WHERE sync_status = ?",
            kind.table()
        );

        let max: Option<i64> = sqlx::query_scalar(&sql)
            .bind(SyncStatus::Pending.flag())
            .fetch_one(&self.pool)
            .await?;

        Ok(max)
    }

    /// Pending records with `after < id <= up_to`, oldest first, at most `limit`.
    pub async fn pending_page(
        &self,
        kind: RecordKind,
        after: RecordId,
        up_to: RecordId,
        limit: i64,
    ) -> Result<Vec<Record>, StoreError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE sync_status = ? AND id > ? AND id <= ? ORDER BY id LIMIT ?",
            COLUMNS,
            kind.table()
        );

        let rows: Vec<RecordRow> = sqlx::query_as(&sql)
            .bind(SyncStatus::Pending.flag())
            .bind(after)
            .bind(up_to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.into_record(kind)).collect()
    }

    /// Move a record from pending to synced.
    ///
    /// Idempotent: returns `false` without touching the row when the record is
    /// already synced (or is not pending for any other reason).
    pub async fn mark_synced(&self, kind: RecordKind, id: RecordId) -> Result<bool, StoreError> {
        let sql = format!(
            "UPDATE {} SET sync_status = ?, synced_at = ?, last_error = NULL \
             WHERE id = ? AND sync_status = ?",
            kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(SyncStatus::Synced.flag())
            .bind(timestamp(Utc::now()))
            .bind(id)
            .bind(SyncStatus::Pending.flag())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record a failed delivery attempt on a pending record.
    ///
    /// Returns the updated counters, or `None` if the record is not pending.
    pub async fn record_failure(
        &self,
        kind: RecordKind,
        id: RecordId,
        error: &str,
        rejected: bool,
    ) -> Result<Option<FailureCount>, StoreError> {
        let sql = format!(
            "UPDATE {} SET attempts = attempts + 1, rejections = rejections + ?, last_error = ? \
             WHERE id = ? AND sync_status = ? RETURNING attempts, rejections",
            kind.table()
        );

        let row: Option<(i64, i64)> = sqlx::query_as(&sql)
            .bind(if rejected { 1i64 } else { 0i64 })
            .bind(error)
            .bind(id)
            .bind(SyncStatus::Pending.flag())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(attempts, rejections)| FailureCount {
            attempts,
            rejections,
        }))
    }

    /// Park a pending record so passes skip it.
    pub async fn quarantine(
        &self,
        kind: RecordKind,
        id: RecordId,
        reason: &str,
    ) -> Result<bool, StoreError> {
        let sql = format!(
            "UPDATE {} SET sync_status = ?, last_error = ? WHERE id = ? AND sync_status = ?",
            kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(SyncStatus::Quarantined.flag())
            .bind(reason)
            .bind(id)
            .bind(SyncStatus::Pending.flag())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Return a quarantined record to the pending queue with fresh counters.
    pub async fn requeue(&self, kind: RecordKind, id: RecordId) -> Result<bool, StoreError> {
        let sql = format!(
            "UPDATE {} SET sync_status = ?, attempts = 0, rejections = 0 \
             WHERE id = ? AND sync_status = ?",
            kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(SyncStatus::Pending.flag())
            .bind(id)
            .bind(SyncStatus::Quarantined.flag())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn counts(&self, kind: RecordKind) -> Result<StatusCounts, StoreError> {
        let sql = format!(
            "SELECT sync_status, COUNT(*) FROM {} GROUP BY sync_status",
            kind.table()
        );

        let rows: Vec<(i64, i64)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let mut counts = StatusCounts::default();
        for (flag, count) in rows {
            match SyncStatus::from_flag(flag) {
                Some(SyncStatus::Pending) => counts.pending = count,
                Some(SyncStatus::Synced) => counts.synced = count,
                Some(SyncStatus::Quarantined) => counts.quarantined = count,
                None => {
                    return Err(StoreError::Corrupt {
                        table: kind.table(),
                        reason: format!("unknown sync_status {}", flag),
                    })
                }
            }
        }
        Ok(counts)
    }

    /// Delete synced records acknowledged before `before`.
    ///
    /// Ids are never reused, so compaction cannot make a new record collide
    /// with a purged one.
    pub async fn purge_synced(
        &self,
        kind: RecordKind,
        before: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE sync_status = ? AND synced_at < ?",
            kind.table()
        );

        let result = sqlx::query(&sql)
            .bind(SyncStatus::Synced.flag())
            .bind(timestamp(before))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Random id generated once per database, used to namespace idempotency
    /// keys sent to the remote endpoint.
    pub async fn installation_id(&self) -> Result<Uuid, StoreError> {
        sqlx::query("INSERT OR IGNORE INTO engine_meta (key, value) VALUES ('installation_id', ?)")
            .bind(Uuid::new_v4().to_string())
            .execute(&self.pool)
            .await?;

        let value: String =
            sqlx::query_scalar("SELECT value FROM engine_meta WHERE key = 'installation_id'")
                .fetch_one(&self.pool)
                .await?;

        Uuid::parse_str(&value).map_err(|e| StoreError::Corrupt {
            table: "engine_meta",
            reason: format!("invalid installation id '{}': {}", value, e),
        })
    }

    /// Close the underlying pool. Later operations fail with a storage error.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
