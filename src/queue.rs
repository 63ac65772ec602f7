//! The two queue flavors behind task discovery: a per-worker deque that
//! peers can steal from, and the shared overflow queue every thread can
//! reach.

use crossbeam::deque::{Injector, Steal, Stealer, Worker};

use crate::task::Task;

/// Deque owned by a single worker thread.
///
/// The owner pushes and pops at one end (newest first, which keeps tasks
/// spawned by a running task hot in that worker's cache); thieves take
/// from the opposite end through [`TaskStealer`] handles. Owner-only use
/// of `push_front`/`try_pop_front` is enforced structurally: the pool
/// moves each `LocalQueue` into its worker's thread-local context, and
/// only stealer handles are shared.
pub(crate) struct LocalQueue {
    deque: Worker<Task>,
}

impl LocalQueue {
    pub(crate) fn new() -> Self {
        Self {
            deque: Worker::new_lifo(),
        }
    }

    pub(crate) fn stealer(&self) -> TaskStealer {
        TaskStealer {
            inner: self.deque.stealer(),
        }
    }

    pub(crate) fn push_front(&self, task: Task) {
        self.deque.push(task);
    }

    pub(crate) fn try_pop_front(&self) -> Option<Task> {
        self.deque.pop()
    }
}

/// Thief-side handle to a [`LocalQueue`]; usable from any thread.
#[derive(Clone)]
pub(crate) struct TaskStealer {
    inner: Stealer<Task>,
}

impl TaskStealer {
    /// Takes the oldest task from the owner's queue, if any. Retries
    /// internally on interference from the owner or another thief, so a
    /// `None` means the queue was observed empty.
    pub(crate) fn try_steal_back(&self) -> Option<Task> {
        loop {
            match self.inner.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => return None,
                Steal::Retry => {}
            }
        }
    }
}

/// Unbounded MPMC FIFO shared by all workers and external submitters.
///
/// Workers poll this as the last discovery tier; there is no blocking
/// wait primitive because idle workers yield instead of sleeping.
pub(crate) struct SharedQueue {
    injector: Injector<Task>,
}

impl SharedQueue {
    pub(crate) fn new() -> Self {
        Self {
            injector: Injector::new(),
        }
    }

    pub(crate) fn push(&self, task: Task) {
        self.injector.push(task);
    }

    /// Non-blocking pop; returns immediately when empty.
    pub(crate) fn try_pop(&self) -> Option<Task> {
        loop {
            match self.injector.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => return None,
                Steal::Retry => {}
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.injector.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn tagged(tag: usize, log: &Arc<AtomicUsize>) -> Task {
        let log = log.clone();
        Task::new(move || {
            log.store(tag, Ordering::SeqCst);
        })
    }

    #[test]
    fn owner_pops_newest_first() {
        let log = Arc::new(AtomicUsize::new(0));
        let q = LocalQueue::new();
        q.push_front(tagged(1, &log));
        q.push_front(tagged(2, &log));
        q.push_front(tagged(3, &log));

        q.try_pop_front().unwrap().run();
        assert_eq!(log.load(Ordering::SeqCst), 3);
        q.try_pop_front().unwrap().run();
        assert_eq!(log.load(Ordering::SeqCst), 2);
        q.try_pop_front().unwrap().run();
        assert_eq!(log.load(Ordering::SeqCst), 1);
        assert!(q.try_pop_front().is_none());
    }

    #[test]
    fn thief_takes_oldest_first() {
        let log = Arc::new(AtomicUsize::new(0));
        let q = LocalQueue::new();
        q.push_front(tagged(1, &log));
        q.push_front(tagged(2, &log));

        let stealer = q.stealer();
        let stolen_log = log.clone();
        thread::spawn(move || {
            stealer.try_steal_back().unwrap().run();
            assert_eq!(stolen_log.load(Ordering::SeqCst), 1);
        })
        .join()
        .unwrap();

        q.try_pop_front().unwrap().run();
        assert_eq!(log.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn steal_and_pop_never_duplicate_or_drop() {
        let q = LocalQueue::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        const TOTAL: usize = 10_000;
        for _ in 0..TOTAL {
            let delivered = delivered.clone();
            q.push_front(Task::new(move || {
                delivered.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let mut thieves = Vec::new();
        for _ in 0..3 {
            let stealer = q.stealer();
            thieves.push(thread::spawn(move || {
                while let Some(task) = stealer.try_steal_back() {
                    task.run();
                }
            }));
        }
        while let Some(task) = q.try_pop_front() {
            task.run();
        }
        for t in thieves {
            t.join().unwrap();
        }
        assert_eq!(delivered.load(Ordering::SeqCst), TOTAL);
    }

    #[test]
    fn shared_queue_is_fifo_for_a_single_consumer() {
        let log = Arc::new(AtomicUsize::new(0));
        let q = SharedQueue::new();
        q.push(tagged(1, &log));
        q.push(tagged(2, &log));
        assert_eq!(q.len(), 2);

        q.try_pop().unwrap().run();
        assert_eq!(log.load(Ordering::SeqCst), 1);
        q.try_pop().unwrap().run();
        assert_eq!(log.load(Ordering::SeqCst), 2);
        assert!(q.try_pop().is_none());
    }
}
