use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time snapshot of pool counters.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub queued_tasks: usize,
    pub submitted_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub handler_panics: usize,
    pub discarded_tasks: usize,
}

impl PoolMetrics {
    /// Tasks handed to the queue that have not been executed or discarded yet.
    pub fn in_flight(&self) -> usize {
        self.submitted_tasks
            .saturating_sub(self.executed())
            .saturating_sub(self.discarded_tasks)
    }

    pub fn executed(&self) -> usize {
        self.completed_tasks + self.failed_tasks + self.handler_panics
    }

    pub fn queue_pressure(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        self.queued_tasks as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.executed();
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}


#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    pub submitted: AtomicUsize,
    pub completed: AtomicUsize,
    pub failed: AtomicUsize,
    pub handler_panics: AtomicUsize,
    pub discarded: AtomicUsize,
}

impl PoolStats {
    pub fn snapshot(&self, workers: usize, queued_tasks: usize) -> PoolMetrics {
        PoolMetrics {
            workers,
            queued_tasks,
            submitted_tasks: self.submitted.load(Ordering::Relaxed),
            completed_tasks: self.completed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            discarded_tasks: self.discarded.load(Ordering::Relaxed),
        }
    }
}
