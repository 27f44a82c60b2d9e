//! Job write operations: create, fatal error bookkeeping, remove.

use anyhow::{Context, Result};

use super::super::db::{unix_timestamp, Ledger};
use crate::model::{JobId, JobRequest};
use crate::task::DayStatus;

impl Ledger {
    /// Insert a job and one Pending day task per eligible day, in one transaction.
    ///
    /// The request is normalized and validated first; an invalid request never
    /// reaches the database.
    pub async fn create_job(&self, request: &JobRequest) -> Result<JobId> {
        let request = request.clone().normalized();
        request.validate().context("invalid job request")?;

        let now = unix_timestamp();
        let region_json = serde_json::to_string(&request.region)?;
        let selection_json = serde_json::to_string(&request.selection)?;
        let hours_json = serde_json::to_string(&request.hours)?;
        let auth_json = serde_json::to_string(&request.auth)?;

        let _w = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        let job_id = sqlx::query(
            r#"
            INSERT INTO jobs (
                name, region_json, selection_json, start_date, end_date,
                hours_json, weekdays, workers, auth_json,
                created_at, updated_at, fatal_error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL)
            "#,
        )
        .bind(&request.name)
        .bind(region_json)
        .bind(selection_json)
        .bind(request.start_date.to_string())
        .bind(request.end_date.to_string())
        .bind(hours_json)
        .bind(i64::from(request.weekdays.bits()))
        .bind(request.workers as i64)
        .bind(auth_json)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for date in request.days() {
            sqlx::query(
                r#"
                INSERT INTO day_tasks (job_id, date, status, attempts, artifacts_json, updated_at)
                VALUES (?1, ?2, ?3, 0, '[]', ?4)
                "#,
            )
            .bind(job_id)
            .bind(date.to_string())
            .bind(DayStatus::Pending.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        tracing::info!(job_id, name = %request.name, days = request.days().len(), "created job");
        Ok(job_id)
    }

    /// Record a job-level fatal condition (e.g. data directory unwritable).
    pub async fn set_fatal_error(&self, id: JobId, message: &str) -> Result<()> {
        let now = unix_timestamp();
        let _w = self.writer.lock().await;
        sqlx::query(
            r#"
            UPDATE jobs
            SET fatal_error = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(message)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clear a previously recorded fatal condition before a new run.
    pub async fn clear_fatal_error(&self, id: JobId) -> Result<()> {
        let now = unix_timestamp();
        let _w = self.writer.lock().await;
        sqlx::query(
            r#"
            UPDATE jobs
            SET fatal_error = NULL,
                updated_at = ?1
            WHERE id = ?2 AND fatal_error IS NOT NULL
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Permanently remove a job and its day tasks. Returns false if no such job.
    ///
    /// Artifact cleanup is handled separately by higher layers.
    pub async fn remove_job(&self, id: JobId) -> Result<bool> {
        let _w = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM day_tasks WHERE job_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(removed > 0)
    }
}
