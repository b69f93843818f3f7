mod record_repo;

pub use record_repo::{FailureCount, RecordStore};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from the local record store. Any of these means the durable write
/// or read did not happen.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to prepare database directory '{}': {}", .path.display(), .source)]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt row in '{table}': {reason}")]
    Corrupt { table: &'static str, reason: String },
}

/// Open (creating if needed) the SQLite database and run migrations.
///
/// The database runs in WAL mode with `synchronous = FULL`, so a committed
/// insert survives a crash or power loss immediately after it returns.
pub async fn init_db(path: &Path) -> Result<SqlitePool, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!("Opened record store at {}", path.display());

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_db_creates_tables() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let pool = init_db(&db_path).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(table_names.contains(&"workouts"));
        assert!(table_names.contains(&"nutrition_logs"));
        assert!(table_names.contains(&"engine_meta"));
    }

    #[tokio::test]
    async fn test_init_db_creates_parent_directories() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("dir").join("test.db");

        init_db(&db_path).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_init_db_uses_wal_journal() {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_init_db_is_reopenable() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let pool = init_db(&db_path).await.unwrap();
        pool.close().await;

        // Migrations must be a no-op the second time
        init_db(&db_path).await.unwrap();
    }
}
