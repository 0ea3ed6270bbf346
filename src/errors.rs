use std::any::Any;

/// Failure delivered to a completion handler instead of unwinding into the worker.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum TaskError {
    #[error("task panicked: {0}")]
    Panicked(String),
    #[error("task failed: {0}")]
    Failed(String),
    #[error("task was dropped before it completed")]
    Abandoned,
    #[error("timed out waiting for task")]
    Timeout,
}

impl TaskError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TaskError::Panicked(panic_message(payload.as_ref()))
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("config error: {0}")]
    Config(String),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("pool is stopped")]
    Stopped,
    #[error("pool already initialized")]
    AlreadyInitialized,
    #[error("pool not initialized")]
    NotInitialized,
}

pub type TaskResult<T> = Result<T, TaskError>;
