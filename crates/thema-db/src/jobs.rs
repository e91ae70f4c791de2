//! Job Store implementation (§4.A): Postgres-backed ETL job tracking plus
//! lazy user creation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row};
use uuid::Uuid;

use thema_core::traits::{JobStore, JobUpdate};
use thema_core::{new_v7, Error, Job, JobStatus, Result};

pub struct PgJobStore {
    pool: Pool<Postgres>,
}

impl PgJobStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_job_row(row: PgRow) -> Result<Job> {
        let status_str: String = row.get("status");
        let documents_created: serde_json::Value = row.get("documents_created");
        let documents_created: Vec<String> =
            serde_json::from_value(documents_created).unwrap_or_default();

        Ok(Job {
            id: row.get("id"),
            user_id: row.get("user_id"),
            anp_seq: row.get("anp_seq"),
            status: status_str
                .parse::<JobStatus>()
                .map_err(Error::Internal)?,
            progress_pct: row.get("progress_percentage"),
            current_step: row.get("current_step"),
            completed_steps: row.get("completed_steps"),
            total_steps: row.get("total_steps"),
            started_at: row.get("started_at"),
            updated_at: row.get("updated_at"),
            completed_at: row.get("completed_at"),
            error_message: row.get("error_message"),
            error_type: row.get("error_type"),
            failed_stage: row.get("failed_stage"),
            retry_count: row.get("retry_count"),
            query_results_summary: row.get("query_results_summary"),
            documents_created,
        })
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn ensure_user(&self, anp_seq: i64) -> Result<Uuid> {
        let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE anp_seq = $1")
            .bind(anp_seq)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = new_v7();
        sqlx::query(
            "INSERT INTO users (id, anp_seq, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (anp_seq) DO NOTHING",
        )
        .bind(id)
        .bind(anp_seq)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        // Another writer may have raced us; read back the authoritative row.
        let id: Uuid = sqlx::query_scalar("SELECT id FROM users WHERE anp_seq = $1")
            .bind(anp_seq)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(id)
    }

    async fn create_job(&self, job: Job) -> Result<Job> {
        let documents_created = serde_json::to_value(&job.documents_created)?;
        let row = sqlx::query(
            "INSERT INTO chat_etl_jobs
                (id, user_id, anp_seq, status, progress_percentage, current_step,
                 completed_steps, total_steps, started_at, updated_at, completed_at,
                 error_message, error_type, failed_stage, retry_count,
                 query_results_summary, documents_created)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
             RETURNING *",
        )
        .bind(job.id)
        .bind(job.user_id)
        .bind(job.anp_seq)
        .bind(job.status.as_str())
        .bind(job.progress_pct)
        .bind(job.current_step)
        .bind(job.completed_steps)
        .bind(job.total_steps)
        .bind(job.started_at)
        .bind(job.updated_at)
        .bind(job.completed_at)
        .bind(&job.error_message)
        .bind(&job.error_type)
        .bind(&job.failed_stage)
        .bind(job.retry_count)
        .bind(&job.query_results_summary)
        .bind(documents_created)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_job_row(row)
    }

    async fn update_job(&self, job_id: Uuid, update: JobUpdate) -> Result<Job> {
        let current = self
            .get_job(job_id)
            .await?
            .ok_or(Error::JobNotFound(job_id))?;

        let status = update.status.unwrap_or(current.status);
        let progress_pct = update.progress_pct.unwrap_or(current.progress_pct);
        let current_step = update.current_step.unwrap_or(current.current_step);
        let completed_steps = update.completed_steps.unwrap_or(current.completed_steps);
        let error_message = update.error_message.or(current.error_message);
        let error_type = update.error_type.or(current.error_type);
        let failed_stage = update.failed_stage.or(current.failed_stage);
        let query_results_summary = update
            .query_results_summary
            .or(current.query_results_summary);
        let documents_created = update
            .documents_created
            .unwrap_or(current.documents_created);
        let documents_created_json = serde_json::to_value(&documents_created)?;
        let completed_at = update.completed_at.or(current.completed_at);

        let row = sqlx::query(
            "UPDATE chat_etl_jobs
             SET status = $2, progress_percentage = $3, current_step = $4,
                 completed_steps = $5, error_message = $6, error_type = $7,
                 failed_stage = $8, query_results_summary = $9,
                 documents_created = $10, completed_at = $11, updated_at = $12
             WHERE id = $1
             RETURNING *",
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(progress_pct)
        .bind(current_step)
        .bind(completed_steps)
        .bind(&error_message)
        .bind(&error_type)
        .bind(&failed_stage)
        .bind(&query_results_summary)
        .bind(documents_created_json)
        .bind(completed_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Self::parse_job_row(row)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM chat_etl_jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn list_jobs_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(
            "SELECT * FROM chat_etl_jobs WHERE user_id = $1 ORDER BY started_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_job_row).collect()
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM chat_etl_jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
