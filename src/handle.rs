//! One-shot future bound to a submitted task's eventual value or error.

use std::time::Duration;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::errors::{TaskError, TaskResult};

/// Creates the slot a submitted task writes its outcome into, plus the
/// handle the submitter keeps. The sender side is captured by the task
/// closure; if the pool is destroyed before the task runs, the closure
/// (and with it the sender) is dropped unsent, which the handle reports
/// as [`TaskError::Abandoned`].
pub(crate) fn result_slot<T>() -> (Sender<TaskResult<T>>, TaskHandle<T>) {
    let (tx, rx) = bounded(1);
    (tx, TaskHandle { receiver: rx })
}

/// Handle to a submitted task's result.
///
/// The slot is written exactly once, by the worker that ran the task.
/// Exactly one retrieval is meaningful: [`get`](TaskHandle::get) consumes
/// the handle, and once a value has been taken through
/// [`try_get`](TaskHandle::try_get) later retrievals report
/// [`TaskError::Abandoned`].
pub struct TaskHandle<T> {
    receiver: Receiver<TaskResult<T>>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task resolves. Never blocks once the task has
    /// resolved or been abandoned.
    pub fn get(self) -> TaskResult<T> {
        self.receiver.recv().unwrap_or(Err(TaskError::Abandoned))
    }

    /// Polls without blocking: `None` while the task is still pending.
    pub fn try_get(&self) -> Option<TaskResult<T>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskError::Abandoned)),
        }
    }

    /// Blocks for at most `timeout` waiting for the task to resolve.
    pub fn get_timeout(&self, timeout: Duration) -> TaskResult<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(TaskError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(TaskError::Abandoned),
        }
    }
}
