//! Fixed-size worker pool with three-tier task discovery: a worker drains
//! its own deque first, then steals from peers, then falls back to the
//! shared overflow queue, and yields when all three come up empty.

use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, trace};

use crate::errors::{panic_message, PoolError, TaskError};
use crate::handle::{result_slot, TaskHandle};
use crate::queue::{LocalQueue, SharedQueue, TaskStealer};
use crate::task::Task;

thread_local! {
    /// Set for the lifetime of a worker thread, absent everywhere else.
    /// Submission routing and tier 1/2 of task discovery read it; it dies
    /// with the thread and needs no teardown beyond the loop dropping it.
    static CURRENT_WORKER: RefCell<Option<WorkerContext>> = const { RefCell::new(None) };
}

struct WorkerContext {
    /// Identity of the owning pool, so a worker of one pool submitting
    /// into another routes through that pool's shared queue instead of
    /// its own deque.
    pool_id: usize,
    index: usize,
    local: LocalQueue,
    need_stop: Cell<bool>,
}

struct PoolShared {
    shared_queue: SharedQueue,
    stealers: Vec<TaskStealer>,
    done: AtomicBool,
    /// Gates the tier-2 peer scan until construction has registered every
    /// stealer, so no thread ever indexes a queue that does not exist yet.
    init_finished: AtomicBool,
    worker_num: usize,
}

impl PoolShared {
    fn id(&self) -> usize {
        self as *const PoolShared as usize
    }

    /// Pushes a task to the calling worker's own deque when the caller is
    /// a worker of this pool, otherwise to the shared overflow queue.
    fn route(&self, task: Task) {
        CURRENT_WORKER.with(|cell| {
            let slot = cell.borrow();
            match slot.as_ref() {
                Some(ctx) if ctx.pool_id == self.id() => ctx.local.push_front(task),
                _ => self.shared_queue.push(task),
            }
        });
    }

    /// Tier 1: the calling worker's own deque.
    fn pop_local(&self) -> Option<Task> {
        CURRENT_WORKER.with(|cell| {
            let slot = cell.borrow();
            match slot.as_ref() {
                Some(ctx) if ctx.pool_id == self.id() => ctx.local.try_pop_front(),
                _ => None,
            }
        })
    }

    /// Tier 2: one round-robin scan over the peer deques, starting just
    /// past the caller's own index (external helpers start at 0).
    fn steal_from_peers(&self) -> Option<Task> {
        if !self.init_finished.load(Ordering::Acquire) {
            return None;
        }
        let n = self.worker_num;
        if n == 0 {
            return None;
        }
        let start = CURRENT_WORKER.with(|cell| {
            let slot = cell.borrow();
            match slot.as_ref() {
                Some(ctx) if ctx.pool_id == self.id() => (ctx.index + 1) % n,
                _ => 0,
            }
        });
        for offset in 0..n {
            if let Some(task) = self.stealers[(start + offset) % n].try_steal_back() {
                return Some(task);
            }
        }
        None
    }

    fn run_pending_task(&self) {
        if let Some(task) = self.pop_local() {
            return task.run();
        }
        if let Some(task) = self.steal_from_peers() {
            return task.run();
        }
        match self.shared_queue.try_pop() {
            Some(task) if task.is_stop() => self.consume_stop(),
            Some(task) => task.run(),
            None => thread::yield_now(),
        }
    }

    /// A stop sentinel popped by a worker of this pool flags that worker
    /// to exit. One popped by any other thread (an external helper) is
    /// pushed back so workers are not starved of their stop signals.
    fn consume_stop(&self) {
        let taken_by_worker = CURRENT_WORKER.with(|cell| {
            let slot = cell.borrow();
            match slot.as_ref() {
                Some(ctx) if ctx.pool_id == self.id() => {
                    trace!(worker = ctx.index, "worker consumed stop sentinel");
                    ctx.need_stop.set(true);
                    true
                }
                _ => false,
            }
        });
        if !taken_by_worker {
            self.shared_queue.push(Task::Stop);
        }
    }
}

fn worker_loop(shared: Arc<PoolShared>, local: LocalQueue, index: usize) {
    trace!(worker = index, "worker thread starting");
    CURRENT_WORKER.with(|cell| {
        *cell.borrow_mut() = Some(WorkerContext {
            pool_id: shared.id(),
            index,
            local,
            need_stop: Cell::new(false),
        });
    });

    loop {
        if shared.done.load(Ordering::Acquire) {
            break;
        }
        let need_stop = CURRENT_WORKER
            .with(|cell| cell.borrow().as_ref().is_some_and(|ctx| ctx.need_stop.get()));
        if need_stop {
            break;
        }
        shared.run_pending_task();
    }

    trace!(worker = index, "worker thread exiting");
    // Releases the deque now rather than at thread teardown, so tasks
    // still queued locally at abrupt shutdown abandon their handles
    // before the pool's drop returns.
    CURRENT_WORKER.with(|cell| cell.borrow_mut().take());
}

/// A fixed-size pool of worker threads executing submitted closures.
///
/// Work is discovered in three tiers (own deque, peer steal, shared
/// overflow queue); idle workers yield the processor rather than block,
/// so an empty pool spins cooperatively instead of sleeping.
///
/// All methods take `&self`, so a pool wrapped in an [`Arc`] can be
/// captured by tasks that submit further tasks into it.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadPool {
    /// Creates a pool with one worker per available hardware thread.
    pub fn new() -> Result<Self, PoolError> {
        Self::with_workers(num_cpus::get())
    }

    /// Creates a pool with exactly `worker_num` workers.
    ///
    /// `worker_num == 0` is a degenerate pool: submitted tasks queue up
    /// but only run if some thread calls
    /// [`run_pending_task`](ThreadPool::run_pending_task) on their behalf.
    ///
    /// Every deque and its stealer is registered before any thread is
    /// spawned. If spawning fails partway, the pool flags itself done,
    /// joins the workers already started and returns the error, leaking
    /// nothing.
    pub fn with_workers(worker_num: usize) -> Result<Self, PoolError> {
        let mut locals = Vec::with_capacity(worker_num);
        let mut stealers = Vec::with_capacity(worker_num);
        for _ in 0..worker_num {
            let queue = LocalQueue::new();
            stealers.push(queue.stealer());
            locals.push(queue);
        }

        let shared = Arc::new(PoolShared {
            shared_queue: SharedQueue::new(),
            stealers,
            done: AtomicBool::new(false),
            init_finished: AtomicBool::new(false),
            worker_num,
        });

        let mut threads = Vec::with_capacity(worker_num);
        for (index, local) in locals.into_iter().enumerate() {
            let shared_for_worker = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("stealpool-worker-{index}"))
                .spawn(move || worker_loop(shared_for_worker, local, index));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(err) => {
                    shared.done.store(true, Ordering::Release);
                    for handle in threads {
                        let _ = handle.join();
                    }
                    return Err(PoolError::Spawn(err));
                }
            }
        }
        shared.init_finished.store(true, Ordering::Release);

        debug!(workers = worker_num, "thread pool started");
        Ok(Self {
            shared,
            threads: Mutex::new(threads),
        })
    }

    /// Submits a closure for execution and returns the handle to its
    /// eventual result. Never blocks.
    ///
    /// A panic inside `f` is caught and surfaced through the handle as
    /// [`TaskError::Panicked`]; it never unwinds a worker thread and
    /// never affects other tasks. When called from inside a running task,
    /// the new task lands on the calling worker's own deque, so recursive
    /// fan-out stays local until a peer steals it.
    pub fn submit<F, T>(&self, f: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, handle) = result_slot();
        let task = Task::new(move || {
            let result = catch_unwind(AssertUnwindSafe(f))
                .map_err(|payload| TaskError::Panicked(panic_message(payload)));
            let _ = tx.send(result);
        });
        self.shared.route(task);
        handle
    }

    /// Runs at most one pending task drawn through the three discovery
    /// tiers, or yields the processor if none is found. Lets any thread
    /// help the pool opportunistically, and is the body of each worker's
    /// loop.
    pub fn run_pending_task(&self) {
        self.shared.run_pending_task();
    }

    /// Graceful shutdown: pushes one stop sentinel per worker into the
    /// shared queue, then blocks until every worker thread has exited.
    /// Calling it from inside a task deadlocks the calling worker.
    ///
    /// Known limitation: sentinels travel through the shared queue, which
    /// every worker drains, so under submission concurrent with `join` a
    /// worker can consume more than one sentinel while another never
    /// reaches the shared queue. Once submission has quiesced every
    /// worker drains to the shared queue and `join` returns.
    pub fn join(&self) {
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        debug!(workers = threads.len(), "joining thread pool");
        for _ in 0..self.shared.worker_num {
            self.shared.shared_queue.push(Task::Stop);
        }
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }

    /// Number of worker threads this pool was created with.
    pub fn worker_count(&self) -> usize {
        self.shared.worker_num
    }

    /// Number of tasks currently waiting in the shared overflow queue.
    pub fn queued_tasks(&self) -> usize {
        self.shared.shared_queue.len()
    }
}

impl Drop for ThreadPool {
    /// Abrupt shutdown: flags the pool done and joins the workers without
    /// draining queued work. Unstarted tasks are dropped and their
    /// handles resolve to [`TaskError::Abandoned`] at retrieval.
    fn drop(&mut self) {
        self.shared.done.store(true, Ordering::Release);
        let mut threads = self.threads.lock().unwrap_or_else(|e| e.into_inner());
        if !threads.is_empty() {
            debug!(workers = threads.len(), "dropping thread pool");
        }
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
    }
}
