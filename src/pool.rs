use super::{
    bulk::BulkTasks,
    errors::{PoolError, TaskResult},
    handle::{completion_pair, TaskHandle},
    model::{PoolMetrics, PoolStats},
    task::{Task, TaskOutcome},
};
use std::{
    fmt,
    sync::{
        atomic::Ordering,
        Arc, Mutex, PoisonError,
    },
    thread::{self, ThreadId},
    time::Duration,
};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tokio_util::sync::CancellationToken;


/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    /// Upper bound on how long an idle worker waits before re-checking the stop flag.
    pub poll_interval: Duration,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            poll_interval: Duration::from_millis(10),
            thread_name_prefix: "workpool".to_string(),
            stack_size: None,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        Self::default()
    }

    pub fn io_bound() -> Self {
        Self {
            num_threads: num_cpus::get() * 2,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.num_threads == 0 {
            return Err(PoolError::Config("num_threads must be greater than 0".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(PoolError::Config("poll_interval must be non-zero".into()));
        }
        Ok(())
    }
}


/// Fixed set of OS threads draining one shared task queue.
///
/// Stopping is cooperative: each idle worker wakes at least once per
/// `poll_interval` to look at the stop flag. Dropping the pool stops it.
pub struct WorkerPool {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    worker_ids: Vec<ThreadId>,
    stop_token: CancellationToken,
    stats: Arc<PoolStats>,
    config: Config,
}

impl WorkerPool {
    pub fn new(num_threads: usize) -> Result<Self, PoolError> {
        Self::with_config(Config::default().with_threads(num_threads))
    }

    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        config.validate()?;

        let (sender, receiver) = channel::unbounded::<Task>();
        let stop_token = CancellationToken::new();
        let stats = Arc::new(PoolStats::default());

        let workers = spawn_workers(&config, &receiver, &stop_token, &stats)?;
        let worker_ids = workers.iter().map(|h| h.thread().id()).collect();

        tracing::info!(
            threads = config.num_threads,
            prefix = %config.thread_name_prefix,
            "worker pool started"
        );
        Ok(Self {
            sender,
            receiver,
            workers: Mutex::new(workers),
            worker_ids,
            stop_token,
            stats,
            config,
        })
    }

    /// Hand one task to the queue. Never blocks.
    #[inline]
    pub fn submit(&self, task: Task) -> Result<(), PoolError> {
        if self.stop_token.is_cancelled() {
            return Err(PoolError::Stopped);
        }
        self.push_task(task)
    }

    /// Build a task from `f` and `done` and submit it.
    pub fn submit_with<R, F, D>(&self, f: F, done: D) -> Result<(), PoolError>
    where
        R: 'static,
        F: FnOnce() -> R + Send + 'static,
        D: FnOnce(TaskResult<R>) + Send + 'static,
    {
        self.submit(Task::new(f, done))
    }

    /// Enqueue up to `count` tasks pulled lazily from `tasks` as one batch.
    ///
    /// Returns the number of tasks actually enqueued.
    pub fn submit_bulk<I>(&self, tasks: I, count: usize) -> Result<usize, PoolError>
    where
        I: IntoIterator<Item = Task>,
    {
        if self.stop_token.is_cancelled() {
            return Err(PoolError::Stopped);
        }

        let mut enqueued = 0;
        for task in tasks.into_iter().take(count) {
            self.push_task(task)?;
            enqueued += 1;
        }
        tracing::trace!(requested = count, enqueued, "bulk submitted");
        Ok(enqueued)
    }

    /// Run `func` once per element of `items` with a single aggregate completion.
    ///
    /// The element count is taken from the exact-size iterator, so `0..n`
    /// submits `n` tasks. `done` may run on any worker thread.
    pub fn for_each<T, F, C>(&self, items: T, func: F, done: C) -> Result<usize, PoolError>
    where
        T: IntoIterator,
        T::IntoIter: ExactSizeIterator,
        T::Item: Send + 'static,
        F: Fn(T::Item) + Send + Sync + 'static,
        C: Fn(TaskResult<()>) + Send + Sync + 'static,
    {
        let iter = items.into_iter();
        let count = iter.len();
        self.for_each_n(iter, count, func, done)
    }

    /// Like [`for_each`](Self::for_each) but bounded by an explicit `count`.
    pub fn for_each_n<I, F, C>(&self, iter: I, count: usize, func: F, done: C) -> Result<usize, PoolError>
    where
        I: Iterator,
        I::Item: Send + 'static,
        F: Fn(I::Item) + Send + Sync + 'static,
        C: Fn(TaskResult<()>) + Send + Sync + 'static,
    {
        self.submit_bulk(BulkTasks::new(iter, count, func, done), count)
    }

    /// Submit `f` and get a handle that resolves with its value or failure.
    pub fn submit_async<R, F>(&self, f: F) -> Result<TaskHandle<R>, PoolError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (done, handle) = completion_pair::<R>();
        self.submit(Task::new(f, done))?;
        Ok(handle)
    }

    /// Like [`submit_async`](Self::submit_async) for computations returning `Result`.
    pub fn submit_async_fallible<R, E, F>(&self, f: F) -> Result<TaskHandle<R>, PoolError>
    where
        R: Send + 'static,
        E: fmt::Display,
        F: FnOnce() -> Result<R, E> + Send + 'static,
    {
        let (done, handle) = completion_pair::<R>();
        self.submit(Task::fallible(f, done))?;
        Ok(handle)
    }

    #[inline(always)]
    fn push_task(&self, task: Task) -> Result<(), PoolError> {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        // the pool owns a receiver, so the channel cannot be disconnected here
        self.sender.send(task).map_err(|_| PoolError::Stopped)?;

        // lost a race with stop(): its drain may already be over
        if self.stop_token.is_cancelled() {
            self.discard_queued();
        }
        Ok(())
    }

    /// Signal every worker to exit, join them, then drop whatever is still queued.
    ///
    /// Completion handlers of discarded tasks never run. A task submitted
    /// while `stop` is in progress is either executed or discarded, never
    /// left in the queue. Concurrent callers all wait for the join.
    ///
    /// Called from inside a task, the pool cannot wait for its own worker:
    /// the flag is set and the call returns without joining.
    pub fn stop(&self) {
        self.stop_token.cancel();

        if self.worker_ids.contains(&thread::current().id()) {
            tracing::warn!("stop requested from a worker thread, workers are not joined");
            return;
        }

        let mut workers = self.lock_workers();
        self.shutdown_workers(&mut workers);
    }

    fn shutdown_workers(&self, workers: &mut Vec<thread::JoinHandle<()>>) {
        let current = thread::current().id();
        let mut joined = 0;
        for handle in workers.drain(..) {
            if handle.thread().id() == current {
                tracing::warn!(
                    thread = ?handle.thread().name(),
                    "pool dropped on its own worker thread, it exits on its next stop check"
                );
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("worker thread panicked outside of a task");
            }
            joined += 1;
        }

        self.discard_queued();

        if joined > 0 {
            tracing::info!(threads = joined, "worker pool stopped");
        }
    }

    fn discard_queued(&self) -> usize {
        let mut discarded = 0;
        while let Ok(task) = self.receiver.try_recv() {
            drop(task);
            discarded += 1;
        }
        if discarded > 0 {
            self.stats.discarded.fetch_add(discarded, Ordering::Relaxed);
            tracing::warn!(discarded, "pool stopped with tasks still queued");
        }
        discarded
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stop_token.is_cancelled()
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.config.num_threads
    }

    /// Number of tasks waiting in the queue.
    #[inline]
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        self.stats.snapshot(self.config.num_threads, self.pending())
    }

    fn lock_workers(&self) -> std::sync::MutexGuard<'_, Vec<thread::JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WorkerPool {
    // may run on one of our own workers when a task held the last reference
    fn drop(&mut self) {
        self.stop_token.cancel();
        let mut workers = std::mem::take(
            self.workers.get_mut().unwrap_or_else(PoisonError::into_inner),
        );
        self.shutdown_workers(&mut workers);
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.config.num_threads)
            .field("pending", &self.pending())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

fn spawn_workers(
    config: &Config,
    receiver: &Receiver<Task>,
    stop_token: &CancellationToken,
    stats: &Arc<PoolStats>,
) -> Result<Vec<thread::JoinHandle<()>>, PoolError> {
    let mut workers = Vec::with_capacity(config.num_threads);
    for index in 0..config.num_threads {
        let mut builder = thread::Builder::new()
            .name(format!("{}-{}", config.thread_name_prefix, index));
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let receiver = receiver.clone();
        let worker_token = stop_token.clone();
        let stats = stats.clone();
        let poll_interval = config.poll_interval;

        let spawned = builder.spawn(move || {
            worker_loop(index, receiver, worker_token, stats, poll_interval);
        });
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                // threads that did start must not outlive the failed constructor
                stop_token.cancel();
                for handle in workers {
                    let _ = handle.join();
                }
                return Err(PoolError::Spawn(e));
            }
        }
    }
    Ok(workers)
}

fn worker_loop(
    index: usize,
    receiver: Receiver<Task>,
    stop_token: CancellationToken,
    stats: Arc<PoolStats>,
    poll_interval: Duration,
) {
    tracing::debug!(worker = index, "worker started");

    loop {
        if stop_token.is_cancelled() {
            break;
        }

        match receiver.recv_timeout(poll_interval) {
            Ok(task) => {
                let counter = match task.execute() {
                    TaskOutcome::Completed => &stats.completed,
                    TaskOutcome::Failed => &stats.failed,
                    TaskOutcome::HandlerPanicked => &stats.handler_panics,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!(worker = index, "worker exiting");
}
