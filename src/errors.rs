use std::io;

use thiserror::Error;

/// Failure to bring up the pool itself.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A worker thread could not be spawned. The pool joins any workers
    /// that were already started before surfacing this.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Failure of an individual submitted task, surfaced through its
/// [`TaskHandle`](crate::handle::TaskHandle).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The task's closure panicked. The payload message is captured; the
    /// worker thread that ran the task is unaffected.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The pool was shut down or dropped before the task ever ran. The
    /// task will never run and the handle will never resolve to a value.
    #[error("pool was shut down before the task ran")]
    Abandoned,

    /// A bounded wait on the handle elapsed before the task resolved.
    #[error("timed out waiting for the task result")]
    Timeout,
}

pub type TaskResult<T> = Result<T, TaskError>;

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
