//! Error reporting seam
//!
//! Background work has no caller to return errors to, so failures are
//! handed to an [`ErrorReporter`]. The default just logs; services that
//! forward to an external error tracker implement the trait themselves.

use std::error::Error;

use parking_lot::Mutex;
use tracing::warn;

/// Fire-and-forget sink for errors nobody is waiting on.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, context: &str, error: &(dyn Error + 'static));

    fn report_message(&self, message: &str);
}

/// Logs every report at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, context: &str, error: &(dyn Error + 'static)) {
        warn!(context, error = %error, "background error");
    }

    fn report_message(&self, message: &str) {
        warn!("{}", message);
    }
}

/// Keeps reports in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<String> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, context: &str, error: &(dyn Error + 'static)) {
        self.reports.lock().push(format!("{}: {}", context, error));
    }

    fn report_message(&self, message: &str) {
        self.reports.lock().push(message.to_string());
    }
}
