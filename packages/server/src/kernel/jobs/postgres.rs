//! PostgreSQL-backed job store.
//!
//! Runtime queries against a `jobs` table; no compile-time query macros so
//! builds never need a live database. Deduplicated insert is a transaction
//! (`SELECT ... FOR UPDATE`, then conditional insert) backed by a partial
//! unique index over active rows, so two concurrent enqueues with the same
//! key cannot both insert.
//!
//! Metadata column contract: the `metadata` column is a JSON *text*
//! document. The column type rejects binary input, so writes always bind a
//! serialized string (`{}` for an empty map, NULL for absent metadata).
//! Reads accept both the textual form and the jsonb binary form (a 0x01
//! version byte ahead of the JSON text), since drivers hand back either.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::job::{Job, JobStatus, JobType};
use super::store::{JobStore, JobStoreError, DEFAULT_MAX_RETRIES};

const JOB_COLUMNS: &str = "id, tenant_id, job_type, status, input_ref, output_ref, error, \
     retry_count, max_retries, last_retry_at, deduplication_key, metadata, \
     progress_step, progress_pct, created_at, updated_at";

/// Job store over a PostgreSQL pool.
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn sanitize(mut job: Job) -> Job {
        job.id = Uuid::new_v4();
        let now = Utc::now();
        job.created_at = now;
        job.updated_at = now;
        if job.max_retries == 0 {
            job.max_retries = DEFAULT_MAX_RETRIES;
        }
        job
    }

    async fn insert<'e, E>(&self, job: &Job, executor: E) -> Result<Job, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let sql = format!(
            "INSERT INTO jobs (id, tenant_id, job_type, status, input_ref, output_ref, error, \
             retry_count, max_retries, last_retry_at, deduplication_key, metadata, \
             progress_step, progress_pct, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job.id)
            .bind(&job.tenant_id)
            .bind(job.job_type)
            .bind(job.status)
            .bind(&job.input_ref)
            .bind(&job.output_ref)
            .bind(&job.error)
            .bind(job.retry_count as i32)
            .bind(job.max_retries as i32)
            .bind(job.last_retry_at)
            .bind(&job.deduplication_key)
            .bind(encode_metadata(&job.metadata))
            .bind(&job.progress_step)
            .bind(job.progress_pct.map(|p| p as i16))
            .bind(job.created_at)
            .bind(job.updated_at)
            .fetch_one(executor)
            .await?;
        row.try_into().map_err(decode_error)
    }

    async fn by_status(&self, status: JobStatus) -> Result<Vec<Job>, JobStoreError> {
        let sql =
            format!("SELECT {JOB_COLUMNS} FROM jobs WHERE status = $1 ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn enqueue(&self, job: Job) -> Result<Job, JobStoreError> {
        let job = Self::sanitize(job);
        self.insert(&job, &self.pool).await.map_err(storage_error)
    }

    async fn enqueue_dedup(&self, job: Job) -> Result<(Job, bool), JobStoreError> {
        let key = match job.deduplication_key.clone() {
            Some(key) => key,
            None => return self.enqueue(job).await.map(|j| (j, false)),
        };

        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE tenant_id = $1 AND deduplication_key = $2 \
             ORDER BY created_at DESC LIMIT 1 FOR UPDATE"
        );
        let prior = sqlx::query_as::<_, JobRow>(&sql)
            .bind(&job.tenant_id)
            .bind(&key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_error)?;

        if let Some(row) = prior {
            let prior: Job = row.try_into()?;
            if prior.status.is_active() || prior.status == JobStatus::Done {
                return Ok((prior, true));
            }
        }

        let job = Self::sanitize(job);
        match self.insert(&job, &mut *tx).await {
            Ok(inserted) => {
                tx.commit().await.map_err(storage_error)?;
                Ok((inserted, false))
            }
            Err(e) if is_unique_violation(&e) => {
                // Lost the race against a concurrent enqueue holding the
                // partial unique index; the winner is the active prior.
                drop(tx);
                let existing = self
                    .get_by_dedup(&job.tenant_id, &key)
                    .await?
                    .ok_or_else(|| {
                        JobStoreError::Storage("dedup conflict with no surviving row".to_string())
                    })?;
                Ok((existing, true))
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn get(&self, tenant_id: &str, id: Uuid) -> Result<Option<Job>, JobStoreError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 AND tenant_id = $2");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_dedup(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> Result<Option<Job>, JobStoreError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE tenant_id = $1 AND deduplication_key = $2 \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(tenant_id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, job: &Job) -> Result<Job, JobStoreError> {
        let sql = format!(
            "UPDATE jobs SET \
             job_type = $1, status = $2, input_ref = $3, output_ref = $4, error = $5, \
             retry_count = $6, max_retries = $7, last_retry_at = $8, deduplication_key = $9, \
             metadata = $10, progress_step = $11, progress_pct = $12, updated_at = NOW() \
             WHERE id = $13 \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job.job_type)
            .bind(job.status)
            .bind(&job.input_ref)
            .bind(&job.output_ref)
            .bind(&job.error)
            .bind(job.retry_count as i32)
            .bind(job.max_retries as i32)
            .bind(job.last_retry_at)
            .bind(&job.deduplication_key)
            .bind(encode_metadata(&job.metadata))
            .bind(&job.progress_step)
            .bind(job.progress_pct.map(|p| p as i16))
            .bind(job.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.ok_or(JobStoreError::NotFound(job.id))?.try_into()
    }

    async fn update_progress(&self, id: Uuid, step: &str, pct: u8) -> Result<(), JobStoreError> {
        let result = sqlx::query(
            "UPDATE jobs SET progress_step = $1, progress_pct = $2, updated_at = NOW() \
             WHERE id = $3",
        )
        .bind(step)
        .bind(pct.min(100) as i16)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list_queued(&self) -> Result<Vec<Job>, JobStoreError> {
        self.by_status(JobStatus::Queued).await
    }

    async fn list_retry(&self) -> Result<Vec<Job>, JobStoreError> {
        self.by_status(JobStatus::Retry).await
    }

    async fn list_running(&self) -> Result<Vec<Job>, JobStoreError> {
        self.by_status(JobStatus::Running).await
    }

    async fn list_dead_letter(&self) -> Result<Vec<Job>, JobStoreError> {
        self.by_status(JobStatus::DeadLetter).await
    }

    async fn move_to_dead_letter(&self, id: Uuid) -> Result<(), JobStoreError> {
        let result =
            sqlx::query("UPDATE jobs SET status = 'dead_letter', updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(JobStoreError::NotFound(id));
        }
        Ok(())
    }

    async fn requeue_dead_letter(&self, id: Uuid) -> Result<Job, JobStoreError> {
        let sql = format!(
            "UPDATE jobs SET status = 'queued', retry_count = 0, error = NULL, \
             last_retry_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = 'dead_letter' \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        row.ok_or(JobStoreError::NotFound(id))?.try_into()
    }

    async fn list_by_input(
        &self,
        tenant_id: &str,
        input_ref: &str,
        job_type: JobType,
    ) -> Result<Vec<Job>, JobStoreError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE tenant_id = $1 AND input_ref = $2 AND job_type = $3 \
             ORDER BY updated_at DESC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(tenant_id)
            .bind(input_ref)
            .bind(job_type)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// ============================================================================
// Row mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    tenant_id: String,
    job_type: JobType,
    status: JobStatus,
    input_ref: String,
    output_ref: Option<String>,
    error: Option<String>,
    retry_count: i32,
    max_retries: i32,
    last_retry_at: Option<DateTime<Utc>>,
    deduplication_key: Option<String>,
    metadata: Option<String>,
    progress_step: Option<String>,
    progress_pct: Option<i16>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = JobStoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let metadata = row
            .metadata
            .as_deref()
            .map(|raw| decode_metadata(raw.as_bytes()))
            .transpose()
            .map_err(|e| JobStoreError::Storage(format!("metadata decode: {e}")))?;

        Ok(Job {
            id: row.id,
            tenant_id: row.tenant_id,
            job_type: row.job_type,
            status: row.status,
            input_ref: row.input_ref,
            output_ref: row.output_ref,
            error: row.error,
            retry_count: row.retry_count.max(0) as u32,
            max_retries: row.max_retries.max(0) as u32,
            last_retry_at: row.last_retry_at,
            deduplication_key: row.deduplication_key,
            metadata,
            progress_step: row.progress_step,
            progress_pct: row.progress_pct.map(|p| p.clamp(0, 100) as u8),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Serialize metadata for the text column. `None` stays NULL; an empty map
/// becomes `{}`.
fn encode_metadata(metadata: &Option<HashMap<String, String>>) -> Option<String> {
    metadata
        .as_ref()
        .map(|m| serde_json::to_string(m).unwrap_or_else(|_| "{}".to_string()))
}

/// Decode a metadata document in either textual or jsonb binary form.
fn decode_metadata(raw: &[u8]) -> Result<HashMap<String, String>, serde_json::Error> {
    match serde_json::from_slice(raw) {
        Ok(map) => Ok(map),
        // jsonb wire form carries a one-byte version header.
        Err(e) => match raw.split_first() {
            Some((1, rest)) => serde_json::from_slice(rest),
            _ => Err(e),
        },
    }
}

fn storage_error(e: sqlx::Error) -> JobStoreError {
    JobStoreError::Storage(e.to_string())
}

fn decode_error(e: JobStoreError) -> sqlx::Error {
    sqlx::Error::Decode(e.to_string().into())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
