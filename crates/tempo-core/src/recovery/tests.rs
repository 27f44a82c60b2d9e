use chrono::NaiveDate;

use super::*;
use crate::ledger::open_memory;
use crate::model::{
    AuthMode, JobRequest, Product, ProductSelection, QualityFilters, Region, Weekdays,
};

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn fetching(d: u32) -> DayTask {
    let mut t = DayTask::new(1, date(d));
    t.claim().unwrap();
    t
}

fn splitting(d: u32) -> DayTask {
    let mut t = fetching(d);
    t.fetched().unwrap();
    t
}

fn done(d: u32) -> DayTask {
    let mut t = splitting(d);
    t.complete(vec![format!("fp/no2_2024-06-{d:02}_14.nc")]).unwrap();
    t
}

#[test]
fn in_flight_without_artifacts_goes_back_to_pending() {
    let r = reconcile(&[fetching(14), splitting(15)], &CacheView::default());
    assert!(r.tasks.iter().all(|t| t.status() == DayStatus::Pending));
    assert_eq!(r.stats, ReconcileStats { reset: 2, promoted: 0 });
    assert_eq!(r.changed.len(), 2);
    assert!(r.tasks.iter().all(|t| t.attempts() == 0));
}

#[test]
fn in_flight_with_artifacts_becomes_done() {
    let view = CacheView::default().with_day(date(14), vec!["fp/a".into(), "fp/b".into()]);
    let r = reconcile(&[fetching(14)], &view);
    assert_eq!(r.tasks[0].status(), DayStatus::Done);
    assert_eq!(r.tasks[0].artifacts(), &["fp/a".to_string(), "fp/b".to_string()]);
    assert_eq!(r.stats, ReconcileStats { reset: 1, promoted: 1 });
}

#[test]
fn terminal_states_untouched() {
    let mut failed = fetching(16);
    let e = crate::retry::DayError {
        job_id: 1,
        date: date(16),
        attempt: 1,
        source: crate::retry::AttemptError::Fetch(crate::fetch::FetchError::Http(404)),
    };
    failed.fail(&e, &crate::retry::RetryPolicy::default(), 0).unwrap();
    assert_eq!(failed.status(), DayStatus::Failed);

    let view = CacheView::default().with_day(date(16), vec!["fp/x".into()]);
    let input = vec![done(14), failed];
    let r = reconcile(&input, &view);
    assert_eq!(r.tasks, input);
    assert!(r.changed.is_empty());
}

#[test]
fn reconcile_is_idempotent() {
    let view = CacheView::default().with_day(date(15), vec!["fp/y".into()]);
    let first = reconcile(&[fetching(14), splitting(15), DayTask::new(1, date(16))], &view);
    let second = reconcile(&first.tasks, &view);
    assert_eq!(second.tasks, first.tasks);
    assert!(second.changed.is_empty());
}

fn request() -> JobRequest {
    JobRequest {
        name: "la".into(),
        region: Region::from_bbox([-119.68, 32.23, -116.38, 35.73]).unwrap(),
        selection: ProductSelection::new([Product::No2], QualityFilters::default()).unwrap(),
        start_date: date(14),
        end_date: date(15),
        hours: vec![14, 15],
        weekdays: Weekdays::ALL,
        workers: 2,
        auth: AuthMode::Anonymous,
    }
}

#[tokio::test]
async fn recover_persists_reconciled_state() {
    let ledger = open_memory().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let cache = HourCache::new(dir.path());
    let req = request();
    let id = ledger.create_job(&req).await.unwrap();

    // Crash mid-fetch on both days; only the 15th's artifacts made it to disk.
    let mut tasks = ledger.load_tasks(id).await.unwrap();
    for t in &mut tasks {
        t.claim().unwrap();
    }
    ledger.persist_tasks(&tasks).await.unwrap();
    let ns = ArtifactNamespace::for_job(&req);
    for h in [14, 15] {
        cache.publish(&ns.key(date(15), h), b"{}").unwrap();
    }
    let fp_dir = dir.path().join(ns.fingerprint());
    std::fs::write(fp_dir.join(".tmpXYZ.part"), b"half").unwrap();

    let recovered = recover(&ledger, &cache).await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].job_id, id);
    assert_eq!(recovered[0].stats, ReconcileStats { reset: 2, promoted: 1 });
    assert_eq!(recovered[0].pending, 1);
    assert_eq!(recovered[0].status, JobStatus::InProgress);
    assert!(!fp_dir.join(".tmpXYZ.part").exists());

    let stored = ledger.load_tasks(id).await.unwrap();
    assert_eq!(stored[0].status(), DayStatus::Pending);
    assert_eq!(stored[1].status(), DayStatus::Done);
    assert_eq!(stored[1].artifacts().len(), 2);

    // Second pass changes nothing.
    let again = recover(&ledger, &cache).await.unwrap();
    assert_eq!(again[0].stats, ReconcileStats::default());
}
