//! Synchronous work-stealing thread pool
//!
//! # Features
//! - Per-worker deques with work-stealing for load balancing
//! - Shared overflow queue for external submitters
//! - Depth-first local routing for tasks spawned from inside tasks
//! - Graceful shutdown via stop sentinels, abrupt shutdown on drop
//! - Panic capture per task, surfaced through the task's handle
//! - Helper threads can opportunistically run pending tasks

pub mod errors;
pub mod handle;
pub mod pool;

mod queue;
mod task;

pub use errors::{PoolError, TaskError, TaskResult};
pub use handle::TaskHandle;
pub use pool::ThreadPool;
