//! RAII guard that releases a claim when dropped.

use super::queue::DayQueue;
use crate::task::DayTask;

/// Releases the claim slot when dropped, whether the day settled, was
/// requeued, or the worker bailed out with an error.
pub(super) struct ClaimGuard<'a> {
    queue: &'a DayQueue,
}

impl<'a> ClaimGuard<'a> {
    pub(super) fn new(queue: &'a DayQueue) -> Self {
        Self { queue }
    }

    /// Put the task back for another attempt. The task is enqueued before the
    /// slot is released so the queue never looks drained in between.
    pub(super) fn requeue(self, task: DayTask) {
        self.queue.push(task);
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.queue.release();
    }
}
