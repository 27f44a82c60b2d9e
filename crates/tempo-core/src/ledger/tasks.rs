//! Day-task persistence.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use super::db::{unix_timestamp, Ledger};
use super::jobs::parse_date;
use crate::model::JobId;
use crate::task::{DayStatus, DayTask};

fn task_from_row(row: &SqliteRow) -> Result<DayTask> {
    let date: String = row.get("date");
    let status: String = row.get("status");
    let artifacts_json: String = row.get("artifacts_json");
    let attempts: i64 = row.get("attempts");
    Ok(DayTask::restore(
        row.get("job_id"),
        parse_date(&date)?,
        DayStatus::from_ledger(&status),
        attempts.max(0) as u32,
        row.get("last_error"),
        serde_json::from_str(&artifacts_json).context("day artifacts")?,
        row.get("not_before"),
    ))
}

async fn write_task(tx: &mut Transaction<'_, Sqlite>, task: &DayTask, now: i64) -> Result<u64> {
    let artifacts_json = serde_json::to_string(task.artifacts())?;
    let r = sqlx::query(
        r#"
        UPDATE day_tasks
        SET status = ?1,
            attempts = ?2,
            last_error = ?3,
            artifacts_json = ?4,
            not_before = ?5,
            updated_at = ?6
        WHERE job_id = ?7 AND date = ?8
        "#,
    )
    .bind(task.status().as_str())
    .bind(i64::from(task.attempts()))
    .bind(task.last_error())
    .bind(artifacts_json)
    .bind(task.not_before())
    .bind(now)
    .bind(task.job_id())
    .bind(task.date().to_string())
    .execute(&mut **tx)
    .await?;
    Ok(r.rows_affected())
}

impl Ledger {
    /// All day tasks of a job ordered by date.
    pub async fn load_tasks(&self, job_id: JobId) -> Result<Vec<DayTask>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, date, status, attempts, last_error, artifacts_json, not_before
            FROM day_tasks
            WHERE job_id = ?1
            ORDER BY date ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    pub async fn load_task(&self, job_id: JobId, date: NaiveDate) -> Result<Option<DayTask>> {
        let row = sqlx::query(
            r#"
            SELECT job_id, date, status, attempts, last_error, artifacts_json, not_before
            FROM day_tasks
            WHERE job_id = ?1 AND date = ?2
            "#,
        )
        .bind(job_id)
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    /// Durably record one task's current state. Must complete before the work
    /// the new state announces begins.
    pub async fn persist_task(&self, task: &DayTask) -> Result<()> {
        self.persist_tasks(std::slice::from_ref(task)).await
    }

    /// Record several tasks atomically (used by reconciliation).
    pub async fn persist_tasks(&self, tasks: &[DayTask]) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }
        let now = unix_timestamp();
        let _w = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        for task in tasks {
            let n = write_task(&mut tx, task, now).await?;
            if n == 0 {
                anyhow::bail!(
                    "no day task {} for job {} in ledger",
                    task.date(),
                    task.job_id()
                );
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Artifact paths recorded by any job other than `exclude`. Used so removing
    /// one job never deletes files another job still points at.
    pub async fn artifacts_referenced_elsewhere(&self, exclude: JobId) -> Result<HashSet<String>> {
        let rows = sqlx::query(
            r#"
            SELECT artifacts_json FROM day_tasks
            WHERE job_id != ?1 AND status = 'done'
            "#,
        )
        .bind(exclude)
        .fetch_all(&self.pool)
        .await?;
        let mut out = HashSet::new();
        for row in rows {
            let json: String = row.get("artifacts_json");
            let paths: Vec<String> = serde_json::from_str(&json).context("day artifacts")?;
            out.extend(paths);
        }
        Ok(out)
    }
}
