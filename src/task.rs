//! The type-erased unit of work moved through the pool's queues.

/// Erased zero-argument closure. The submitted closure's return value and
/// any panic are captured inside, into the result slot paired with it at
/// submission time, so running a job never unwinds into the worker loop.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work, or the stop marker that tells a worker to exit its loop.
///
/// Tasks are move-only and run at most once: [`Task::run`] consumes the
/// task. `Stop` carries no closure and must never be run; workers check
/// [`Task::is_stop`] before executing anything popped from the shared queue.
pub(crate) enum Task {
    Work(Job),
    Stop,
}

impl Task {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task::Work(Box::new(f))
    }

    pub(crate) fn is_stop(&self) -> bool {
        matches!(self, Task::Stop)
    }

    /// Executes the wrapped closure. A no-op for `Stop`.
    pub(crate) fn run(self) {
        if let Task::Work(job) = self {
            job();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn stop_marker_is_flagged_and_inert() {
        let task = Task::Stop;
        assert!(task.is_stop());
        task.run();
    }

    #[test]
    fn work_runs_exactly_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let task = Task::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!task.is_stop());
        task.run();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
