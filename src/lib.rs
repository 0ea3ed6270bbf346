//! Fixed-size worker pool executing type-erased tasks off the calling thread.
//!
//! # Features
//! - One-shot [`Task`]s pairing a computation with a completion handler
//! - Panics and `Err` results captured and delivered to the handler
//! - Bulk submission over a range with one aggregate completion
//! - Futures-based bridge for waiting on a single result
//! - Cooperative shutdown with bounded-latency worker wakeups

pub mod bulk;
pub mod errors;
pub mod global;
pub mod handle;
pub mod model;
pub mod pool;
pub mod task;

pub use bulk::{BulkTasks, CompletionPolicy};
pub use errors::{PoolError, TaskError, TaskResult};
pub use handle::TaskHandle;
pub use pool::{Config, WorkerPool};
pub use task::{Task, TaskOutcome};

/// Install a `tracing` subscriber honouring `RUST_LOG`, defaulting to `info`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}
