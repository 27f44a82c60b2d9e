//! Job read operations: get and list.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::Row;

use super::super::db::Ledger;
use super::super::types::{JobRecord, JobSummary};
use crate::model::{JobId, JobRequest, JobStatus, Weekdays};

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("bad date in ledger: {s:?}"))
}

impl Ledger {
    /// Fetch a single job with its full request.
    pub async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>> {
        let row = sqlx::query(
            r#"
            SELECT
                id, name, region_json, selection_json, start_date, end_date,
                hours_json, weekdays, workers, auth_json,
                created_at, updated_at, fatal_error
            FROM jobs
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let region_json: String = row.get("region_json");
        let selection_json: String = row.get("selection_json");
        let hours_json: String = row.get("hours_json");
        let auth_json: String = row.get("auth_json");
        let start_date: String = row.get("start_date");
        let end_date: String = row.get("end_date");
        let weekdays: i64 = row.get("weekdays");
        let workers: i64 = row.get("workers");

        let request = JobRequest {
            name: row.get("name"),
            region: serde_json::from_str(&region_json).context("job region")?,
            selection: serde_json::from_str(&selection_json).context("job selection")?,
            start_date: parse_date(&start_date)?,
            end_date: parse_date(&end_date)?,
            hours: serde_json::from_str(&hours_json).context("job hours")?,
            weekdays: Weekdays::from_bits(weekdays as u8),
            workers: workers.max(1) as usize,
            auth: serde_json::from_str(&auth_json).context("job auth")?,
        };

        Ok(Some(JobRecord {
            id: row.get("id"),
            request,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            fatal_error: row.get("fatal_error"),
        }))
    }

    /// List all jobs with day-task counts, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT
                j.id, j.name, j.start_date, j.end_date, j.fatal_error, j.created_at,
                COUNT(t.date) AS total,
                COALESCE(SUM(t.status = 'done'), 0) AS done,
                COALESCE(SUM(t.status = 'failed'), 0) AS failed,
                COALESCE(SUM(t.status IN ('fetching', 'splitting')), 0) AS in_flight
            FROM jobs j
            LEFT JOIN day_tasks t ON t.job_id = j.id
            GROUP BY j.id
            ORDER BY j.created_at DESC, j.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let start_date: String = row.get("start_date");
            let end_date: String = row.get("end_date");
            let total = row.get::<i64, _>("total") as usize;
            let done = row.get::<i64, _>("done") as usize;
            let failed = row.get::<i64, _>("failed") as usize;
            out.push(JobSummary {
                id: row.get("id"),
                name: row.get("name"),
                start_date: parse_date(&start_date)?,
                end_date: parse_date(&end_date)?,
                total,
                done,
                failed,
                in_flight: row.get::<i64, _>("in_flight") as usize,
                status: JobStatus::from_counts(total, done, failed),
                fatal_error: row.get("fatal_error"),
                created_at: row.get("created_at"),
            });
        }
        Ok(out)
    }

    /// Ids of jobs that still have non-terminal day tasks, oldest first.
    pub async fn list_unfinished_jobs(&self) -> Result<Vec<JobId>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT job_id
            FROM day_tasks
            WHERE status NOT IN ('done', 'failed')
            ORDER BY job_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("job_id")).collect())
    }
}
