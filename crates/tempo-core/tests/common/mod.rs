//! Shared fixtures: a scripted upstream, payload builder and engine harness.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use tempfile::TempDir;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use tempo_core::cache::HourCache;
use tempo_core::fetch::{ClientFactory, DayRequest, FetchClient, FetchError, SessionContext};
use tempo_core::ledger::Ledger;
use tempo_core::model::{
    AuthMode, JobRequest, Product, ProductSelection, QualityFilters, QualityTier, Region, Weekdays,
};
use tempo_core::retry::RetryPolicy;
use tempo_core::scheduler::Engine;
use tempo_core::splitter::{DailyPayload, HourStep, Pixel};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// What the upstream does for a given date.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Full,
    /// Payload lacks this hour for every product.
    MissingHour(u8),
    Garbage,
    Connection,
    Http(u32),
    /// Fail with a connection error this many times, then serve normally.
    FlakyThen(u32),
    /// Hold the transfer until the session token fires.
    BlockUntilCancelled,
}

/// Scripted upstream with instrumentation shared by every session.
#[derive(Default)]
pub struct FakeUpstream {
    behaviors: Mutex<HashMap<NaiveDate, Behavior>>,
    failures_left: Mutex<HashMap<NaiveDate, u32>>,
    in_flight: Mutex<HashSet<NaiveDate>>,
    workdirs: Mutex<Vec<PathBuf>>,
    pub calls: AtomicUsize,
    pub overlaps: AtomicUsize,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    pub started: Notify,
    pub delay: Mutex<Duration>,
}

impl FakeUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, day: NaiveDate, behavior: Behavior) {
        if let Behavior::FlakyThen(n) = behavior {
            self.failures_left.lock().unwrap().insert(day, n);
        }
        self.behaviors.lock().unwrap().insert(day, behavior);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn workdirs(&self) -> Vec<PathBuf> {
        self.workdirs.lock().unwrap().clone()
    }

    fn behavior(&self, day: NaiveDate) -> Behavior {
        self.behaviors
            .lock()
            .unwrap()
            .get(&day)
            .cloned()
            .unwrap_or(Behavior::Full)
    }

    fn serve(&self, req: &DayRequest, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
        let products = req.selection.products();
        match self.behavior(req.date) {
            Behavior::Full => Ok(payload(req.date, &req.hours, products)),
            Behavior::MissingHour(h) => {
                let hours: Vec<u8> = req.hours.iter().copied().filter(|x| *x != h).collect();
                Ok(payload(req.date, &hours, products))
            }
            Behavior::Garbage => Ok(b"<html>maintenance</html>".to_vec()),
            Behavior::Connection => Err(FetchError::Connection("connection reset".into())),
            Behavior::Http(code) => Err(FetchError::Http(code)),
            Behavior::FlakyThen(_) => {
                let mut left = self.failures_left.lock().unwrap();
                let n = left.entry(req.date).or_insert(0);
                if *n > 0 {
                    *n -= 1;
                    Err(FetchError::Connection("flaky".into()))
                } else {
                    Ok(payload(req.date, &req.hours, products))
                }
            }
            Behavior::BlockUntilCancelled => {
                while !cancel.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(FetchError::Cancelled)
            }
        }
    }
}

pub struct FakeFactory(pub Arc<FakeUpstream>);

impl ClientFactory for FakeFactory {
    fn open_session(&self, ctx: &SessionContext) -> Result<Box<dyn FetchClient>, FetchError> {
        self.0.workdirs.lock().unwrap().push(ctx.workdir.clone());
        Ok(Box::new(FakeSession {
            upstream: Arc::clone(&self.0),
            workdir: ctx.workdir.clone(),
            cancel: ctx.cancel.clone(),
        }))
    }
}

struct FakeSession {
    upstream: Arc<FakeUpstream>,
    workdir: PathBuf,
    cancel: CancellationToken,
}

impl FetchClient for FakeSession {
    fn fetch_day(&mut self, req: &DayRequest) -> Result<Vec<u8>, FetchError> {
        let up = &self.upstream;
        up.calls.fetch_add(1, Ordering::SeqCst);
        if !up.in_flight.lock().unwrap().insert(req.date) {
            up.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let active = up.active.fetch_add(1, Ordering::SeqCst) + 1;
        up.peak.fetch_max(active, Ordering::SeqCst);
        up.started.notify_one();

        // The scratch dir must exist and belong to this session alone.
        std::fs::write(self.workdir.join("session.lock"), b"").map_err(FetchError::Io)?;
        let delay = *up.delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let result = up.serve(req, &self.cancel);

        up.active.fetch_sub(1, Ordering::SeqCst);
        up.in_flight.lock().unwrap().remove(&req.date);
        result
    }
}

/// A well-formed daily payload: per hour and product, one good and one cloudy pixel.
pub fn payload(day: NaiveDate, hours: &[u8], products: &[Product]) -> Vec<u8> {
    let pixel = |cloud: f64| Pixel {
        lat: 34.0,
        lon: -118.0,
        value: 4.2e15,
        quality: QualityTier::High,
        cloud_fraction: cloud,
        solar_zenith: 30.0,
    };
    let steps = hours
        .iter()
        .flat_map(|&hour| {
            products.iter().map(move |&product| HourStep {
                hour,
                product,
                pixels: vec![pixel(0.1), pixel(0.9)],
            })
        })
        .collect();
    serde_json::to_vec(&DailyPayload { date: day, steps }).unwrap()
}

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        payload_attempts: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(10),
    }
}

/// NO2 over southern California, 14..=23 UTC.
pub fn no2_request(start: &str, end: &str, workers: usize) -> JobRequest {
    JobRequest {
        name: "socal no2".into(),
        region: Region::from_bbox([-119.68, 32.23, -116.38, 35.73]).unwrap(),
        selection: ProductSelection::new([Product::No2], QualityFilters::default()).unwrap(),
        start_date: date(start),
        end_date: date(end),
        hours: (14..=23).collect(),
        weekdays: Weekdays::ALL,
        workers,
        auth: AuthMode::Anonymous,
    }
}

pub struct Harness {
    pub engine: Engine,
    pub upstream: Arc<FakeUpstream>,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    _dir: TempDir,
}

impl Harness {
    pub async fn new(retry: RetryPolicy) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("artifacts");
        let db_path = dir.path().join("ledger.db");
        Self::with_paths(dir, data_dir, db_path, retry).await
    }

    pub async fn with_paths(
        dir: TempDir,
        data_dir: PathBuf,
        db_path: PathBuf,
        retry: RetryPolicy,
    ) -> Self {
        let upstream = FakeUpstream::new();
        let engine = Engine {
            ledger: Ledger::open_at(&db_path).await.unwrap(),
            cache: HourCache::new(&data_dir),
            clients: Arc::new(FakeFactory(Arc::clone(&upstream))),
            retry,
            fetch_timeout: Duration::from_secs(5),
        };
        Self {
            engine,
            upstream,
            data_dir,
            db_path,
            _dir: dir,
        }
    }

    /// Same data dir and ledger file, fresh engine and upstream: a restarted process.
    pub async fn restart(self) -> Self {
        let Harness {
            engine,
            data_dir,
            db_path,
            _dir,
            ..
        } = self;
        let retry = engine.retry;
        drop(engine);
        Self::with_paths(_dir, data_dir, db_path, retry).await
    }
}
