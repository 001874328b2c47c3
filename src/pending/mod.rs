//! Handles to in-flight computations
//!
//! This module provides:
//! - [`PendingFuture`]: the polling contract the aggregator consumes
//! - [`TaskHandle`] / [`Completer`]: a one-shot result slot, produced by
//!   [`channel`] or [`spawn_task`]
//! - [`TokioTask`]: a tokio `JoinHandle` polled from synchronous code
//! - [`Resolved`]: an already-finished outcome

use std::any::Any;
use std::task::Poll;
use std::time::Duration;

use crate::error::PollFault;

mod handle;
mod tokio_task;

pub use handle::{channel, spawn_task, Completer, TaskHandle};
pub use tokio_task::TokioTask;

/// What one bounded wait on a pending future produced.
pub type WaitOutcome<T, E> = Result<Poll<Result<T, E>>, PollFault>;

/// A computation started elsewhere that will eventually succeed or fail.
pub trait PendingFuture {
    type Output;
    type Error;

    /// Whether an outcome is available without waiting.
    fn is_done(&self) -> bool;

    /// Wait at most `timeout` for the outcome.
    ///
    /// `Ok(Poll::Pending)` means "not yet" and is not an error. `Err` means
    /// the handle itself is broken and will never produce an outcome.
    fn wait_for(&mut self, timeout: Duration) -> WaitOutcome<Self::Output, Self::Error>;
}

impl<F: PendingFuture + ?Sized> PendingFuture for Box<F> {
    type Output = F::Output;
    type Error = F::Error;

    fn is_done(&self) -> bool {
        (**self).is_done()
    }

    fn wait_for(&mut self, timeout: Duration) -> WaitOutcome<Self::Output, Self::Error> {
        (**self).wait_for(timeout)
    }
}

/// An outcome that is known up front.
#[derive(Debug)]
pub struct Resolved<T, E> {
    outcome: Option<Result<T, E>>,
}

impl<T, E> Resolved<T, E> {
    pub fn new(outcome: Result<T, E>) -> Self {
        Self {
            outcome: Some(outcome),
        }
    }

    pub fn ok(value: T) -> Self {
        Self::new(Ok(value))
    }

    pub fn err(error: E) -> Self {
        Self::new(Err(error))
    }
}

impl<T, E> PendingFuture for Resolved<T, E> {
    type Output = T;
    type Error = E;

    fn is_done(&self) -> bool {
        true
    }

    fn wait_for(&mut self, _timeout: Duration) -> WaitOutcome<T, E> {
        self.outcome
            .take()
            .map(Poll::Ready)
            .ok_or_else(|| PollFault::AlreadyTaken {
                name: "resolved".to_string(),
            })
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_yields_once() {
        let mut done: Resolved<u32, String> = Resolved::ok(7);
        assert!(done.is_done());
        assert_eq!(
            done.wait_for(Duration::ZERO).unwrap(),
            Poll::Ready(Ok(7))
        );
        assert!(matches!(
            done.wait_for(Duration::ZERO),
            Err(PollFault::AlreadyTaken { .. })
        ));
    }

    #[test]
    fn test_boxed_dyn_future() {
        let mut boxed: Box<dyn PendingFuture<Output = u32, Error = String>> =
            Box::new(Resolved::err("nope".to_string()));
        assert!(boxed.is_done());
        assert_eq!(
            boxed.wait_for(Duration::ZERO).unwrap(),
            Poll::Ready(Err("nope".to_string()))
        );
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        let other: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
