//! Type-erased one-shot unit of work.
//!
//! A [`Task`] pairs a computation with the completion handler that receives
//! its result. Both are boxed behind [`Runnable`] once, when the task is
//! built, so the queue only ever moves a single owned handle around.

use super::errors::{panic_message, TaskError, TaskResult};
use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
};

/// What happened when a task was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Computation succeeded and the handler returned normally.
    Completed,
    /// Computation failed; the handler received the failure.
    Failed,
    /// The handler itself panicked. The panic was logged and swallowed.
    HandlerPanicked,
}

/// Erased execution entry point. Consuming `self` makes a second run impossible.
pub trait Runnable: Send {
    fn run(self: Box<Self>) -> TaskOutcome;
}

struct Job<C, D> {
    compute: C,
    complete: D,
}

impl<R, C, D> Runnable for Job<C, D>
where
    C: FnOnce() -> TaskResult<R> + Send,
    D: FnOnce(TaskResult<R>) + Send,
{
    fn run(self: Box<Self>) -> TaskOutcome {
        let Job { compute, complete } = *self;

        let result = match catch_unwind(AssertUnwindSafe(compute)) {
            Ok(res) => res,
            Err(payload) => Err(TaskError::from_panic(payload)),
        };
        let failed = result.is_err();

        match catch_unwind(AssertUnwindSafe(move || complete(result))) {
            Ok(()) if failed => TaskOutcome::Failed,
            Ok(()) => TaskOutcome::Completed,
            Err(payload) => {
                tracing::error!(
                    panic = %panic_message(payload.as_ref()),
                    "uncaught panic in task completion handler"
                );
                TaskOutcome::HandlerPanicked
            }
        }
    }
}

/// Move-only handle to a pending unit of work.
pub struct Task {
    inner: Box<dyn Runnable>,
}

impl Task {
    /// Build a task from an infallible computation. A panic inside `f` is
    /// delivered to `done` as [`TaskError::Panicked`].
    pub fn new<R, F, D>(f: F, done: D) -> Self
    where
        R: 'static,
        F: FnOnce() -> R + Send + 'static,
        D: FnOnce(TaskResult<R>) + Send + 'static,
    {
        Self::from_runnable(Box::new(Job {
            compute: move || -> TaskResult<R> { Ok(f()) },
            complete: done,
        }))
    }

    /// Build a task from a computation that reports failure through `Err`.
    pub fn fallible<R, E, F, D>(f: F, done: D) -> Self
    where
        R: 'static,
        E: fmt::Display,
        F: FnOnce() -> Result<R, E> + Send + 'static,
        D: FnOnce(TaskResult<R>) + Send + 'static,
    {
        Self::from_runnable(Box::new(Job {
            compute: move || -> TaskResult<R> { f().map_err(|e| TaskError::Failed(e.to_string())) },
            complete: done,
        }))
    }

    pub fn from_runnable(inner: Box<dyn Runnable>) -> Self {
        Self { inner }
    }

    /// Run the computation, then the handler. Never unwinds.
    #[inline]
    pub fn execute(self) -> TaskOutcome {
        self.inner.run()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}
