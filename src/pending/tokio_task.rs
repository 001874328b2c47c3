use std::future::Future;
use std::task::Poll;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::{panic_message, PendingFuture, WaitOutcome};
use crate::error::PollFault;

/// A tokio task polled from a plain (non-async) thread.
///
/// Each bounded wait blocks the calling thread on the runtime, so a
/// `TokioTask` must not be waited on from inside that runtime's async
/// context; aggregate from a dedicated thread or `spawn_blocking`.
pub struct TokioTask<T, E> {
    name: String,
    runtime: Handle,
    join: Option<JoinHandle<Result<T, E>>>,
}

impl<T, E> TokioTask<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Spawn `future` on `runtime` and track it.
    pub fn spawn<Fut>(runtime: &Handle, name: impl Into<String>, future: Fut) -> Self
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let join = runtime.spawn(future);
        Self::from_join(runtime.clone(), name, join)
    }

    /// Track a task that was spawned elsewhere.
    pub fn from_join(
        runtime: Handle,
        name: impl Into<String>,
        join: JoinHandle<Result<T, E>>,
    ) -> Self {
        Self {
            name: name.into(),
            runtime,
            join: Some(join),
        }
    }
}

impl<T, E> TokioTask<T, E> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T, E> PendingFuture for TokioTask<T, E> {
    type Output = T;
    type Error = E;

    fn is_done(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn wait_for(&mut self, timeout: Duration) -> WaitOutcome<T, E> {
        let Some(join) = self.join.as_mut() else {
            return Err(PollFault::AlreadyTaken {
                name: self.name.clone(),
            });
        };

        match self.runtime.block_on(tokio::time::timeout(timeout, join)) {
            Err(_elapsed) => Ok(Poll::Pending),
            Ok(joined) => {
                self.join = None;
                match joined {
                    Ok(outcome) => Ok(Poll::Ready(outcome)),
                    Err(e) if e.is_panic() => Err(PollFault::Panicked {
                        name: self.name.clone(),
                        message: panic_message(e.into_panic().as_ref()),
                    }),
                    Err(_) => Err(PollFault::Cancelled {
                        name: self.name.clone(),
                    }),
                }
            }
        }
    }
}

impl<T, E> std::fmt::Debug for TokioTask<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioTask")
            .field("name", &self.name)
            .field("done", &self.is_done())
            .finish()
    }
}
