//! Lazy task generation for one logical bulk submission.
//!
//! [`BulkTasks`] turns an iterator, a per-element function and one aggregate
//! completion handler into up to `total` tasks. All generated tasks share a
//! single reference-counted completion state; the last task to finish drops it.

use super::{
    errors::TaskResult,
    task::Task,
};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};


/// How sibling completions are folded into the aggregate handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionPolicy {
    /// Every failure observed while `count < total` is reported, so `k`
    /// failing tasks produce `k` invocations. Success is reported once, when
    /// the successful-completion count reaches `total`. Failures never
    /// advance the count, so success is never reported after a failure.
    #[default]
    ReportEachFailure,
    /// Same decisions, but a latch lets only the first invocation through.
    FirstOutcomeOnly,
}

struct BulkState<F, C> {
    func: F,
    done: C,
    total: usize,
    count: AtomicUsize,
    policy: CompletionPolicy,
    fired: AtomicBool,
}

impl<F, C> BulkState<F, C>
where
    C: Fn(TaskResult<()>),
{
    fn record(&self, outcome: TaskResult<()>) {
        if self.count.load(Ordering::Acquire) >= self.total {
            return;
        }
        match outcome {
            Err(e) => self.deliver(Err(e)),
            Ok(()) => {
                if self.count.fetch_add(1, Ordering::AcqRel) + 1 == self.total {
                    self.deliver(Ok(()));
                }
            }
        }
    }

    fn deliver(&self, outcome: TaskResult<()>) {
        if self.policy == CompletionPolicy::FirstOutcomeOnly
            && self.fired.swap(true, Ordering::AcqRel)
        {
            return;
        }
        (self.done)(outcome);
    }
}

/// Pull-based source of the tasks for one bulk submission.
pub struct BulkTasks<I, F, C> {
    iter: I,
    remaining: usize,
    state: Arc<BulkState<F, C>>,
}

impl<I, F, C> BulkTasks<I, F, C>
where
    I: Iterator,
    I::Item: Send + 'static,
    F: Fn(I::Item) + Send + Sync + 'static,
    C: Fn(TaskResult<()>) + Send + Sync + 'static,
{
    /// `total` is fixed up front; `iter` must yield at least that many items
    /// for the aggregate success to ever fire.
    pub fn new(iter: I, total: usize, func: F, done: C) -> Self {
        Self {
            iter,
            remaining: total,
            state: Arc::new(BulkState {
                func,
                done,
                total,
                count: AtomicUsize::new(0),
                policy: CompletionPolicy::default(),
                fired: AtomicBool::new(false),
            }),
        }
    }

    /// Must be chosen before the first task is generated.
    pub fn with_policy(mut self, policy: CompletionPolicy) -> Self {
        match Arc::get_mut(&mut self.state) {
            Some(state) => state.policy = policy,
            None => tracing::warn!(?policy, "bulk tasks already generated, policy unchanged"),
        }
        self
    }

    pub fn total(&self) -> usize {
        self.state.total
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.state.policy
    }
}

impl<I, F, C> Iterator for BulkTasks<I, F, C>
where
    I: Iterator,
    I::Item: Send + 'static,
    F: Fn(I::Item) + Send + Sync + 'static,
    C: Fn(TaskResult<()>) + Send + Sync + 'static,
{
    type Item = Task;

    fn next(&mut self) -> Option<Task> {
        if self.remaining == 0 {
            return None;
        }
        let Some(item) = self.iter.next() else {
            tracing::warn!(
                missing = self.remaining,
                total = self.state.total,
                "bulk iterator exhausted early, aggregate success will not fire"
            );
            self.remaining = 0;
            return None;
        };
        self.remaining -= 1;

        let run_state = Arc::clone(&self.state);
        let done_state = Arc::clone(&self.state);
        Some(Task::new(
            move || (run_state.func)(item),
            move |outcome| done_state.record(outcome),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<I, F, C> std::fmt::Debug for BulkTasks<I, F, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkTasks")
            .field("remaining", &self.remaining)
            .field("total", &self.state.total)
            .field("count", &self.state.count.load(Ordering::Relaxed))
            .field("policy", &self.state.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TaskError;
    use std::sync::Mutex;

    fn recorder() -> (
        Arc<Mutex<Vec<TaskResult<()>>>>,
        impl Fn(TaskResult<()>) + Send + Sync + 'static,
    ) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let c = calls.clone();
        (calls, move |r: TaskResult<()>| c.lock().unwrap().push(r))
    }

    #[test]
    fn all_success_fires_once_in_any_order() {
        let (calls, done) = recorder();
        let mut tasks: Vec<Task> = BulkTasks::new(0..5, 5, |_| {}, done).collect();
        assert_eq!(tasks.len(), 5);

        tasks.reverse();
        for t in tasks {
            t.execute();
        }
        assert_eq!(*calls.lock().unwrap(), vec![Ok(())]);
    }

    #[test]
    fn each_failure_is_reported() {
        let (calls, done) = recorder();
        let tasks = BulkTasks::new(0..4, 4, |i| {
            if i % 2 == 0 {
                panic!("element {i}");
            }
        }, done);
        for t in tasks {
            t.execute();
        }

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|r| r.is_err()));
    }

    #[test]
    fn latch_reports_first_only() {
        let (calls, done) = recorder();
        let tasks = BulkTasks::new(0..4, 4, |i| {
            if i % 2 == 0 {
                panic!("element {i}");
            }
        }, done)
        .with_policy(CompletionPolicy::FirstOutcomeOnly);
        for t in tasks {
            t.execute();
        }

        let calls = calls.lock().unwrap();
        assert_eq!(*calls, vec![Err(TaskError::Panicked("element 0".into()))]);
    }

    #[test]
    fn zero_total_generates_nothing() {
        let (calls, done) = recorder();
        let mut tasks = BulkTasks::new(0..10, 0, |_| {}, done);
        assert!(tasks.next().is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn short_iterator_stops_early() {
        let (calls, done) = recorder();
        let tasks: Vec<Task> = BulkTasks::new(0..2, 3, |_| {}, done).collect();
        assert_eq!(tasks.len(), 2);
        for t in tasks {
            t.execute();
        }
        assert!(calls.lock().unwrap().is_empty());
    }
}
