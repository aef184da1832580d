//! Postgres implementation of [`DataAccess`], in the query style of
//! `intelligent-crawler::storage::postgres` — plain `sqlx::query` with
//! explicit `.bind`/`.get`, no query builder abstraction.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use submission_core::{
    BusinessProfile, DirectoryInfo, Job, JobStatus, SubmissionStatus, UpsertOutcome,
};
use uuid::Uuid;

use crate::{traits::DataAccess, DbError};

pub struct PostgresDataAccess {
    pool: PgPool,
}

impl PostgresDataAccess {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DataAccess for PostgresDataAccess {
    async fn upsert_job_result(
        &self,
        job_id: Uuid,
        directory: &str,
        status: SubmissionStatus,
        idempotency_key: &str,
        payload: Option<serde_json::Value>,
        response_log: Option<serde_json::Value>,
        error_message: Option<&str>,
    ) -> Result<UpsertOutcome, DbError> {
        // `INSERT ... ON CONFLICT (idempotency_key) DO UPDATE ... WHERE
        // job_results.status NOT IN ('submitted', 'skipped')` enforces
        // Invariant I2 at the database grain: a terminal row refuses the
        // demote, and `RETURNING (xmax = 0)` tells us whether our write
        // actually landed (xmax 0 => fresh insert, nonzero => update ran).
        // When the WHERE clause suppresses the update, no row comes back,
        // which is how we detect `DuplicateSuccess` without a prior read.
        let row = sqlx::query(
            r#"
            INSERT INTO job_results (
                id, job_id, directory_name, status, idempotency_key,
                payload, response_log, error_message, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            ON CONFLICT (idempotency_key) DO UPDATE SET
                status = EXCLUDED.status,
                payload = COALESCE(EXCLUDED.payload, job_results.payload),
                response_log = COALESCE(EXCLUDED.response_log, job_results.response_log),
                error_message = COALESCE(EXCLUDED.error_message, job_results.error_message),
                updated_at = NOW()
            WHERE job_results.status NOT IN ('submitted', 'skipped')
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(directory)
        .bind(status)
        .bind(idempotency_key)
        .bind(payload)
        .bind(response_log)
        .bind(error_message)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) if r.get::<bool, _>("inserted") => UpsertOutcome::Inserted,
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::DuplicateSuccess,
        })
    }

    async fn set_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        let started_at_clause = matches!(status, JobStatus::InProgress);
        let completed_at_clause = matches!(status, JobStatus::Completed | JobStatus::Failed);

        sqlx::query(
            r#"
            UPDATE jobs SET
                status = $1,
                error_message = COALESCE($2, error_message),
                started_at = CASE WHEN $3 AND started_at IS NULL THEN NOW() ELSE started_at END,
                completed_at = CASE WHEN $4 THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(status)
        .bind(error_message)
        .bind(started_at_clause)
        .bind(completed_at_clause)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_history(
        &self,
        job_id: Uuid,
        directory: Option<&str>,
        event: &str,
        details: Option<serde_json::Value>,
        worker_id: Option<&str>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO queue_history (id, job_id, directory_name, event, details, worker_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(job_id)
        .bind(directory)
        .bind(event)
        .bind(details.unwrap_or_else(|| serde_json::json!({})))
        .bind(worker_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_business_profile(&self, job_id: Uuid) -> Result<BusinessProfile, DbError> {
        let row = sqlx::query(
            r#"
            SELECT
                c.business_name, c.email, c.phone, c.website, c.address,
                c.city, c.state, c.zip, c.description, c.category
            FROM jobs j
            JOIN customers c ON c.id = j.customer_id
            WHERE j.id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(DbError::JobNotFound(job_id))?;

        Ok(BusinessProfile {
            business_name: row.get("business_name"),
            email: row.get("email"),
            phone: row.get("phone"),
            website: row.get("website"),
            address: row.get("address"),
            city: row.get("city"),
            state: row.get("state"),
            zip: row.get("zip"),
            description: row.get("description"),
            category: row.get("category"),
        })
    }

    async fn get_directory_info(&self, directory: &str) -> Result<DirectoryInfo, DbError> {
        let row = sqlx::query(
            r#"SELECT id, name, url FROM directories WHERE name ILIKE $1 OR url ILIKE $1 LIMIT 1"#,
        )
        .bind(format!("%{directory}%"))
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => DirectoryInfo {
                id: r.get("id"),
                name: r.get("name"),
                url: r.get("url"),
            },
            None => DirectoryInfo::synthesize(directory),
        })
    }

    async fn get_directories_for_job(&self, job_id: Uuid) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT directory_name FROM job_directories
            WHERE job_id = $1 AND status = 'pending'
            ORDER BY created_at ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.get("directory_name")).collect())
    }

    async fn upsert_worker_heartbeat(
        &self,
        worker_id: &str,
        queue_name: &str,
        status: &str,
        current_job_id: Option<Uuid>,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO worker_heartbeats (worker_id, queue_name, status, current_job_id, last_heartbeat, metadata)
            VALUES ($1, $2, $3, $4, NOW(), $5)
            ON CONFLICT (worker_id) DO UPDATE SET
                queue_name = EXCLUDED.queue_name,
                status = EXCLUDED.status,
                current_job_id = EXCLUDED.current_job_id,
                last_heartbeat = NOW(),
                metadata = EXCLUDED.metadata
            "#,
        )
        .bind(worker_id)
        .bind(queue_name)
        .bind(status)
        .bind(current_job_id)
        .bind(metadata.unwrap_or_else(|| serde_json::json!({})))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_stale_jobs(&self, threshold_minutes: i64) -> Result<Vec<Job>, DbError> {
        // "No liveness signal within the window": a job qualifies either
        // because its freshest heartbeat (joined via current_job_id) is
        // older than the threshold, or because no heartbeat was ever
        // recorded and the job has itself been in_progress longer than
        // the threshold.
        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT j.* FROM jobs j
            LEFT JOIN LATERAL (
                SELECT MAX(h.last_heartbeat) AS last_heartbeat
                FROM worker_heartbeats h
                WHERE h.current_job_id = j.id
            ) hb ON TRUE
            WHERE j.status = 'in_progress'
              AND (
                    (hb.last_heartbeat IS NOT NULL AND hb.last_heartbeat < NOW() - ($1 || ' minutes')::interval)
                 OR (hb.last_heartbeat IS NULL AND j.started_at IS NOT NULL AND j.started_at < NOW() - ($1 || ' minutes')::interval)
              )
            "#,
        )
        .bind(threshold_minutes.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Job, DbError> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::JobNotFound(job_id))
    }

    async fn most_recent_heartbeat(
        &self,
        job_id: Uuid,
    ) -> Result<Option<chrono::DateTime<Utc>>, DbError> {
        let row = sqlx::query(
            "SELECT MAX(last_heartbeat) AS last_heartbeat FROM worker_heartbeats WHERE current_job_id = $1",
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("last_heartbeat"))
    }

    async fn insert_job(&self, job: Job) -> Result<Job, DbError> {
        sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, customer_id, package_size, priority, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(job.id)
        .bind(&job.customer_id)
        .bind(job.package_size)
        .bind(job.priority)
        .bind(job.status)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::from)
    }
}
