//! Deferred values
//!
//! A [`Deferred`] wraps one unit of asynchronous work and memoizes its
//! outcome. Creating it does no work at all; the wrapped future is first
//! polled by [`Deferred::force`], and every later `force` (from any clone, any
//! task) observes the same value or the same error. A deferred built from a
//! known value is complete from the start.

use crate::error::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;

/// Single-fulfilment async value
pub struct Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Inner<T>,
}

enum Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    Ready(Result<T>),
    Pending(Shared<BoxFuture<'static, Result<T>>>),
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap `operation` without starting it
    pub fn new<F>(operation: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            inner: Inner::Pending(operation.boxed().shared()),
        }
    }

    /// An already-fulfilled value; forcing it never does any work
    pub fn ready(value: T) -> Self {
        Self {
            inner: Inner::Ready(Ok(value)),
        }
    }

    /// An already-failed value
    pub fn failed(error: Error) -> Self {
        Self {
            inner: Inner::Ready(Err(error)),
        }
    }

    /// Wait for the outcome, running the operation if nobody has yet
    pub async fn force(&self) -> Result<T> {
        match &self.inner {
            Inner::Ready(outcome) => outcome.clone(),
            Inner::Pending(shared) => shared.clone().await,
        }
    }

    /// The memoized outcome, if the operation has completed
    pub fn peek(&self) -> Option<&Result<T>> {
        match &self.inner {
            Inner::Ready(outcome) => Some(outcome),
            Inner::Pending(shared) => shared.peek(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.peek().is_some()
    }
}

impl<T> Clone for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            Inner::Ready(outcome) => Inner::Ready(outcome.clone()),
            Inner::Pending(shared) => Inner::Pending(shared.clone()),
        };
        Self { inner }
    }
}

impl<T> fmt::Debug for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.peek() {
            None => "pending",
            Some(Ok(_)) => "fulfilled",
            Some(Err(_)) => "failed",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}
