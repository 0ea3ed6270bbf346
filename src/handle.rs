use super::errors::{TaskError, TaskResult};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::{
    sync::oneshot,
    time::Duration,
};


/// Split a single-value result into the completion side and the waiting side.
///
/// The returned closure fulfils the handle exactly once; dropping it without
/// calling resolves the handle to [`TaskError::Abandoned`].
pub fn completion_pair<T>() -> (impl FnOnce(TaskResult<T>) + Send + 'static, TaskHandle<T>)
where
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel::<TaskResult<T>>();
    let complete = move |result: TaskResult<T>| {
        // receiver may already be gone; nobody is waiting then
        let _ = tx.send(result);
    };
    (complete, TaskHandle::new(rx))
}

/// Handle on the eventual result of a submitted computation
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<TaskResult<T>>,
}

impl<T> TaskHandle<T> {

    pub fn new(receiver: oneshot::Receiver<TaskResult<T>>) -> Self {
        Self { receiver }
    }

    /// Block the current thread until the result arrives.
    ///
    /// Panics if called from inside an async runtime; `.await` the handle there.
    pub fn wait(self) -> TaskResult<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(TaskError::Abandoned))
    }

    pub async fn await_timeout(self, timeout: Duration) -> TaskResult<T> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TaskError::Abandoned),
            Err(_) => Err(TaskError::Timeout),
        }
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.unwrap_or(Err(TaskError::Abandoned))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

/// Await every handle. Results come back in completion order, not submission order.
pub async fn join_all<T>(handles: Vec<TaskHandle<T>>) -> Vec<TaskResult<T>> {
    if handles.is_empty() {
        return Vec::new();
    }

    let len = handles.len();
    let mut futures = FuturesUnordered::from_iter(handles);
    let mut results = Vec::with_capacity(len);

    while let Some(result) = futures.next().await {
        results.push(result);
    }

    results
}
