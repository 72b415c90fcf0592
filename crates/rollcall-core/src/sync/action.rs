use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Action was cancelled")]
pub struct Cancelled;

/// One user-triggered operation running on its own task.
///
/// Awaiting the action yields its output; `cancel` aborts it at its next
/// suspension point. Dropping the handle without awaiting leaves the task
/// running to completion with nobody interested in the result.
pub struct Action<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Action<T> {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for Action<T> {
    type Output = Result<T, Cancelled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(output) => Ok(output),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Cancelled),
        })
    }
}
