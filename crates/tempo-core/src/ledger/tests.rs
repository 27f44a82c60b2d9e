//! Tests for the ledger (use in-memory DB helper from db).

use std::time::Duration;

use chrono::NaiveDate;

use crate::fetch::FetchError;
use crate::ledger::open_memory;
use crate::model::{
    hour_range, AuthMode, JobRequest, JobStatus, Product, ProductSelection, QualityFilters,
    Region, Weekdays,
};
use crate::retry::{AttemptError, DayError, RetryPolicy};
use crate::task::DayStatus;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn request(name: &str, start: &str, end: &str) -> JobRequest {
    JobRequest {
        name: name.into(),
        region: Region::from_bbox([-119.68, 32.23, -116.38, 35.73])
            .unwrap()
            .with_label("los_angeles"),
        selection: ProductSelection::new([Product::No2], QualityFilters::default()).unwrap(),
        start_date: date(start),
        end_date: date(end),
        hours: hour_range(14, 23),
        weekdays: Weekdays::ALL,
        workers: 2,
        auth: AuthMode::Key("k".into()),
    }
}

#[tokio::test]
async fn create_job_persists_request_and_tasks() {
    let db = open_memory().await.unwrap();
    let req = request("la", "2024-06-14", "2024-06-16");
    let id = db.create_job(&req).await.unwrap();

    let job = db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.request, req);
    assert!(job.fatal_error.is_none());

    let tasks = db.load_tasks(id).await.unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.status() == DayStatus::Pending));
    assert_eq!(tasks[0].date(), date("2024-06-14"));
    assert_eq!(tasks[2].date(), date("2024-06-16"));
}

#[tokio::test]
async fn invalid_request_is_not_persisted() {
    let db = open_memory().await.unwrap();
    let req = request("bad", "2024-06-16", "2024-06-14");
    assert!(db.create_job(&req).await.is_err());
    assert!(db.list_jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn persist_task_roundtrip() {
    let db = open_memory().await.unwrap();
    let id = db
        .create_job(&request("la", "2024-06-14", "2024-06-15"))
        .await
        .unwrap();
    let mut t = db.load_task(id, date("2024-06-14")).await.unwrap().unwrap();
    t.claim().unwrap();
    db.persist_task(&t).await.unwrap();
    let e = DayError {
        job_id: id,
        date: t.date(),
        attempt: 1,
        source: AttemptError::Fetch(FetchError::Http(502)),
    };
    t.fail(&e, &RetryPolicy::default(), 10_000).unwrap();
    db.persist_task(&t).await.unwrap();

    let back = db.load_task(id, date("2024-06-14")).await.unwrap().unwrap();
    assert_eq!(back, t);
    assert_eq!(back.status(), DayStatus::Pending);
    assert_eq!(back.attempts(), 1);
    assert_eq!(
        back.not_before(),
        Some(10_000 + Duration::from_millis(500).as_millis() as i64)
    );
}

#[tokio::test]
async fn list_jobs_derives_status() {
    let db = open_memory().await.unwrap();
    let a = db
        .create_job(&request("a", "2024-06-14", "2024-06-15"))
        .await
        .unwrap();
    let b = db
        .create_job(&request("b", "2024-06-14", "2024-06-14"))
        .await
        .unwrap();

    let mut tasks = db.load_tasks(a).await.unwrap();
    tasks[0].satisfy_from_cache(vec!["x".into()]).unwrap();
    tasks[1].claim().unwrap();
    db.persist_tasks(&tasks).await.unwrap();

    let mut tb = db.load_tasks(b).await.unwrap();
    tb[0].satisfy_from_cache(vec!["y".into()]).unwrap();
    db.persist_tasks(&tb).await.unwrap();

    let jobs = db.list_jobs().await.unwrap();
    assert_eq!(jobs.len(), 2);
    // Newest first
    assert_eq!(jobs[0].id, b);
    assert_eq!(jobs[0].status, JobStatus::Completed);
    assert_eq!(jobs[1].id, a);
    assert_eq!(jobs[1].status, JobStatus::InProgress);
    assert_eq!(jobs[1].done, 1);
    assert_eq!(jobs[1].in_flight, 1);
    assert_eq!(jobs[1].pending(), 0);

    assert_eq!(db.list_unfinished_jobs().await.unwrap(), vec![a]);
}

#[tokio::test]
async fn fatal_error_set_and_cleared() {
    let db = open_memory().await.unwrap();
    let id = db
        .create_job(&request("a", "2024-06-14", "2024-06-14"))
        .await
        .unwrap();
    db.set_fatal_error(id, "data directory /x is not writable")
        .await
        .unwrap();
    assert!(db.get_job(id).await.unwrap().unwrap().fatal_error.is_some());
    db.clear_fatal_error(id).await.unwrap();
    assert!(db.get_job(id).await.unwrap().unwrap().fatal_error.is_none());
}

#[tokio::test]
async fn remove_job_drops_tasks() {
    let db = open_memory().await.unwrap();
    let a = db
        .create_job(&request("a", "2024-06-14", "2024-06-15"))
        .await
        .unwrap();
    let b = db
        .create_job(&request("b", "2024-06-14", "2024-06-14"))
        .await
        .unwrap();
    let mut tb = db.load_tasks(b).await.unwrap();
    tb[0].satisfy_from_cache(vec!["fp/no2_2024-06-14_14.nc".into()]).unwrap();
    db.persist_tasks(&tb).await.unwrap();

    assert!(db.remove_job(a).await.unwrap());
    assert!(!db.remove_job(a).await.unwrap());
    assert!(db.get_job(a).await.unwrap().is_none());
    assert!(db.load_tasks(a).await.unwrap().is_empty());

    let refs = db.artifacts_referenced_elsewhere(a).await.unwrap();
    assert!(refs.contains("fp/no2_2024-06-14_14.nc"));
    assert!(db.artifacts_referenced_elsewhere(b).await.unwrap().is_empty());
}

#[tokio::test]
async fn persist_unknown_task_errors() {
    let db = open_memory().await.unwrap();
    let ghost = crate::task::DayTask::new(42, date("2024-06-14"));
    assert!(db.persist_task(&ghost).await.is_err());
}
