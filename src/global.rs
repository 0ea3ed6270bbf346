//! Process-scoped pool for callers that do not want to thread a
//! [`WorkerPool`] through their own code.
//!
//! Initialize once with [`init`], tear down with [`shutdown`]. The pool
//! itself stays instance-based; this module only owns one instance.

use super::{
    errors::PoolError,
    handle::TaskHandle,
    pool::{Config, WorkerPool},
};
use std::sync::{Arc, PoisonError, RwLock};

static GLOBAL_POOL: RwLock<Option<Arc<WorkerPool>>> = RwLock::new(None);

pub fn init(config: Config) -> Result<(), PoolError> {
    let mut slot = GLOBAL_POOL.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(PoolError::AlreadyInitialized);
    }
    *slot = Some(Arc::new(WorkerPool::with_config(config)?));
    Ok(())
}

pub fn current() -> Result<Arc<WorkerPool>, PoolError> {
    GLOBAL_POOL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(PoolError::NotInitialized)
}

pub fn submit_async<R, F>(f: F) -> Result<TaskHandle<R>, PoolError>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    current()?.submit_async(f)
}

/// Stop the process-wide pool and clear the slot. Returns `false` if there was none.
///
/// Workers are joined here even if other `Arc`s to the pool are still alive.
pub fn shutdown() -> bool {
    let pool = GLOBAL_POOL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match pool {
        Some(pool) => {
            pool.stop();
            true
        }
        None => false,
    }
}
