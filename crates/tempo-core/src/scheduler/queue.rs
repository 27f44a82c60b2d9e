//! Shared claim queue for one job run.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Notify;

use crate::task::DayTask;

/// Upper bound on how long an idle worker sleeps before re-checking the queue.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// Current time as Unix milliseconds (for `not_before`).
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub(super) enum Claim {
    /// Exclusive ownership of a task; no other worker can see it until it is
    /// pushed back.
    Ready(DayTask),
    /// Nothing claimable yet; sleep at most this long.
    Wait(Duration),
    /// No queued tasks and none in flight.
    Drained,
}

struct QueueState {
    waiting: VecDeque<DayTask>,
    in_flight: usize,
}

pub(super) struct DayQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl DayQueue {
    pub(super) fn new(tasks: impl IntoIterator<Item = DayTask>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                waiting: tasks.into_iter().collect(),
                in_flight: 0,
            }),
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the first task whose backoff has elapsed.
    pub(super) fn claim(&self, now_ms: i64) -> Claim {
        let mut s = self.lock();
        let ready = s
            .waiting
            .iter()
            .position(|t| t.not_before().map_or(true, |nb| nb <= now_ms));
        if let Some(task) = ready.and_then(|i| s.waiting.remove(i)) {
            s.in_flight += 1;
            return Claim::Ready(task);
        }
        match s.waiting.iter().filter_map(|t| t.not_before()).min() {
            Some(earliest) => {
                let until = Duration::from_millis(earliest.saturating_sub(now_ms).max(1) as u64);
                Claim::Wait(until.min(IDLE_POLL))
            }
            None if s.in_flight == 0 => Claim::Drained,
            None => Claim::Wait(IDLE_POLL),
        }
    }

    pub(super) fn push(&self, task: DayTask) {
        self.lock().waiting.push_back(task);
        self.notify.notify_waiters();
    }

    pub(super) fn release(&self) {
        {
            let mut s = self.lock();
            s.in_flight = s.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Sleep until woken by a push/release or `max` elapses.
    pub(super) async fn idle(&self, max: Duration) {
        tokio::select! {
            _ = self.notify.notified() => {}
            _ = tokio::time::sleep(max) => {}
        }
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.lock().waiting.len()
    }
}
