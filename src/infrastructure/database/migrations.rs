use crate::shared::error::AppError;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;

/// Schema steps in ascending order. Applied steps are never edited; new
/// changes go into a new step.
const MIGRATIONS: &[(i64, &str)] = &[
    (
        1,
        r#"
        CREATE TABLE responses (
            id TEXT PRIMARY KEY NOT NULL,
            survey_id TEXT NOT NULL,
            survey_version TEXT NOT NULL,
            user_id TEXT NOT NULL,
            assignment_id TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            answers TEXT NOT NULL DEFAULT '{}',
            device_info TEXT,
            location TEXT,
            started_at INTEGER NOT NULL,
            completed_at INTEGER,
            duration_seconds INTEGER,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            sync_attempts INTEGER NOT NULL DEFAULT 0,
            last_sync_error TEXT,
            last_synced_at INTEGER,
            remote_response_id TEXT,
            immutable INTEGER NOT NULL DEFAULT 0,
            content_hash TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX idx_responses_sync_status ON responses(sync_status);
        CREATE INDEX idx_responses_status ON responses(status);
        CREATE INDEX idx_responses_user ON responses(user_id);

        CREATE TABLE local_files (
            id TEXT PRIMARY KEY NOT NULL,
            response_id TEXT NOT NULL REFERENCES responses(id) ON DELETE CASCADE,
            question_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            local_path TEXT,
            inline_data TEXT,
            file_name TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            upload_attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            remote_object_id TEXT,
            remote_version TEXT,
            remote_url TEXT,
            extraction TEXT,
            uploaded_at INTEGER,
            local_purged_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX idx_local_files_sync_status ON local_files(sync_status);
        CREATE INDEX idx_local_files_response ON local_files(response_id);

        CREATE TABLE sync_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            operation_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            priority INTEGER NOT NULL DEFAULT 10,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 5,
            next_retry_at INTEGER,
            last_error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            completed_at INTEGER
        );
        CREATE INDEX idx_sync_queue_status ON sync_queue(status, priority, created_at);
        CREATE INDEX idx_sync_queue_entity ON sync_queue(entity_type, entity_id);

        CREATE TABLE kv_cache (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            expires_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX idx_kv_cache_expires_at ON kv_cache(expires_at);
        "#,
    ),
    (
        2,
        r#"
        CREATE INDEX idx_local_files_response_question
            ON local_files(response_id, question_id);
        "#,
    ),
];

pub const LATEST_VERSION: i64 = 2;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to read schema version: {0}")]
    ReadVersion(#[source] sqlx::Error),

    #[error("migration {version} failed: {source}")]
    Step {
        version: i64,
        #[source]
        source: sqlx::Error,
    },

    #[error("database schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: i64, supported: i64 },

    #[error("failed to commit migrations: {0}")]
    Commit(#[source] sqlx::Error),
}

impl From<MigrationError> for AppError {
    fn from(err: MigrationError) -> Self {
        AppError::Migration(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub previous_version: i64,
    pub current_version: i64,
    pub applied: Vec<i64>,
}

pub(super) async fn read_version(conn: &mut SqliteConnection) -> Result<i64, AppError> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await
        .map_err(MigrationError::ReadVersion)?;
    Ok(version)
}

pub(super) async fn run(pool: &SqlitePool) -> Result<MigrationOutcome, MigrationError> {
    let mut tx = pool.begin().await.map_err(MigrationError::ReadVersion)?;

    let current: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *tx)
        .await
        .map_err(MigrationError::ReadVersion)?;

    if current > LATEST_VERSION {
        return Err(MigrationError::UnsupportedVersion {
            found: current,
            supported: LATEST_VERSION,
        });
    }

    let pending: Vec<&(i64, &str)> = MIGRATIONS.iter().filter(|(v, _)| *v > current).collect();
    if pending.is_empty() {
        return Ok(MigrationOutcome {
            previous_version: current,
            current_version: current,
            applied: Vec::new(),
        });
    }

    let mut applied = Vec::with_capacity(pending.len());
    for (version, ddl) in pending {
        tracing::debug!(version, "applying migration");
        sqlx::raw_sql(ddl)
            .execute(&mut *tx)
            .await
            .map_err(|source| MigrationError::Step {
                version: *version,
                source,
            })?;
        applied.push(*version);
    }

    // user_version はトランザクション内で更新するので DDL と同時に確定する
    sqlx::raw_sql(&format!("PRAGMA user_version = {LATEST_VERSION}"))
        .execute(&mut *tx)
        .await
        .map_err(|source| MigrationError::Step {
            version: LATEST_VERSION,
            source,
        })?;

    tx.commit().await.map_err(MigrationError::Commit)?;

    Ok(MigrationOutcome {
        previous_version: current,
        current_version: LATEST_VERSION,
        applied,
    })
}
