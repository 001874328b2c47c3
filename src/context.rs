//! Injected collaborators
//!
//! A [`Context`] bundles the clock, error reporter and launcher that the
//! aggregator, references and daemons use. Nothing in the crate reaches
//! for process-wide state; tests build a context around a
//! [`ManualClock`](crate::clock::ManualClock) and a
//! [`CollectingReporter`](crate::reporter::CollectingReporter).

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::launcher::{Launcher, ThreadLauncher};
use crate::reporter::{ErrorReporter, TracingReporter};

#[derive(Clone)]
pub struct Context {
    pub clock: Arc<dyn Clock>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub launcher: Arc<dyn Launcher>,
}

impl Context {
    /// System clock, tracing reporter, one thread per launch.
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
            reporter: Arc::new(TracingReporter),
            launcher: Arc::new(ThreadLauncher),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("now_millis", &self.clock.now_millis())
            .finish_non_exhaustive()
    }
}
