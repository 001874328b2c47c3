use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::{panic_message, PendingFuture, WaitOutcome};
use crate::error::{PollFault, Result};
use crate::launcher::Launcher;

enum State<T, E> {
    Waiting,
    Done(std::result::Result<T, E>),
    Panicked(String),
    Dropped,
    Taken,
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
    changed: Condvar,
}

/// Write side of a one-shot result slot.
///
/// Dropping a completer without calling [`complete`](Self::complete) turns
/// the paired handle into a [`PollFault::Disconnected`].
pub struct Completer<T, E> {
    shared: Arc<Shared<T, E>>,
    finished: bool,
}

/// Read side of a one-shot result slot.
pub struct TaskHandle<T, E> {
    name: String,
    shared: Arc<Shared<T, E>>,
}

/// Create a connected completer/handle pair.
pub fn channel<T, E>(name: impl Into<String>) -> (Completer<T, E>, TaskHandle<T, E>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Waiting),
        changed: Condvar::new(),
    });
    (
        Completer {
            shared: Arc::clone(&shared),
            finished: false,
        },
        TaskHandle {
            name: name.into(),
            shared,
        },
    )
}

/// Run `f` through `launcher` and return a handle to its outcome.
///
/// A panic inside `f` surfaces as [`PollFault::Panicked`] on the handle.
pub fn spawn_task<T, E, F>(launcher: &dyn Launcher, name: &str, f: F) -> Result<TaskHandle<T, E>>
where
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let (completer, handle) = channel(name);
    launcher.launch(
        name,
        Box::new(move || match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(outcome) => completer.complete(outcome),
            Err(payload) => completer.panicked(panic_message(payload.as_ref())),
        }),
    )?;
    Ok(handle)
}

impl<T, E> Completer<T, E> {
    pub fn complete(mut self, outcome: std::result::Result<T, E>) {
        self.finish(State::Done(outcome));
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, error: E) {
        self.complete(Err(error));
    }

    fn panicked(mut self, message: String) {
        self.finish(State::Panicked(message));
    }

    fn finish(&mut self, state: State<T, E>) {
        self.finished = true;
        *self.shared.state.lock() = state;
        self.shared.changed.notify_all();
    }
}

impl<T, E> Drop for Completer<T, E> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(State::Dropped);
        }
    }
}

impl<T, E> TaskHandle<T, E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the outcome arrives, however long that takes.
    pub fn join(mut self) -> std::result::Result<std::result::Result<T, E>, PollFault> {
        loop {
            if let Poll::Ready(outcome) = self.wait_for(Duration::from_secs(3600))? {
                return Ok(outcome);
            }
        }
    }

    fn take(&self, state: &mut State<T, E>) -> WaitOutcome<T, E> {
        match std::mem::replace(state, State::Taken) {
            State::Waiting => {
                *state = State::Waiting;
                Ok(Poll::Pending)
            }
            State::Done(outcome) => Ok(Poll::Ready(outcome)),
            State::Panicked(message) => Err(PollFault::Panicked {
                name: self.name.clone(),
                message,
            }),
            State::Dropped => Err(PollFault::Disconnected {
                name: self.name.clone(),
            }),
            State::Taken => Err(PollFault::AlreadyTaken {
                name: self.name.clone(),
            }),
        }
    }
}

impl<T, E> PendingFuture for TaskHandle<T, E> {
    type Output = T;
    type Error = E;

    fn is_done(&self) -> bool {
        !matches!(*self.shared.state.lock(), State::Waiting)
    }

    fn wait_for(&mut self, timeout: Duration) -> WaitOutcome<T, E> {
        let mut state = self.shared.state.lock();
        if matches!(*state, State::Waiting) && !timeout.is_zero() {
            self.shared.changed.wait_while_for(
                &mut state,
                |s| matches!(s, State::Waiting),
                timeout,
            );
        }
        self.take(&mut state)
    }
}

impl<T, E> std::fmt::Debug for TaskHandle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("done", &self.is_done())
            .finish()
    }
}
