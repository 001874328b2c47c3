use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::backoff::backoff_delay;
use super::slot::Slot;
use super::Refresh;
use crate::config::RefreshConfig;
use crate::context::Context;
use crate::error::{AwaitError, BoxError, Result};
use crate::pending::panic_message;

/// A cached value that is recomputed off the caller's thread.
///
/// A stale read returns the previous value at once and starts a refresh;
/// at most one refresh runs at a time. Only a reference that has never
/// held a value makes the caller wait, and only for the attempt in
/// progress.
///
/// Failed refreshes never reach callers. They are passed to the context's
/// [`ErrorReporter`](crate::reporter::ErrorReporter), the old value stays
/// in place, and each further attempt first sleeps
/// [`backoff_delay`](super::backoff_delay) for the current error count.
pub struct BackgroundRefreshingRef<R: Refresh> {
    inner: Arc<Inner<R>>,
}

struct Inner<R: Refresh> {
    name: String,
    source: R,
    config: RefreshConfig,
    ctx: Context,
    state: Mutex<State<R::Value>>,
    settled: Condvar,
    in_flight: AtomicBool,
    errors: AtomicU32,
}

struct State<T> {
    slot: Slot<T>,
    /// Finished refresh attempts, successful or not.
    attempts: u64,
}

impl<R> BackgroundRefreshingRef<R>
where
    R: Refresh + 'static,
    R::Value: Send + 'static,
    R::Error: Into<BoxError>,
{
    /// Build the reference; with `populate_on_start` the first refresh is
    /// launched immediately.
    pub fn new(name: impl Into<String>, source: R, config: RefreshConfig, ctx: Context) -> Self {
        let populate = config.populate_on_start;
        let inner = Arc::new(Inner {
            name: name.into(),
            source,
            config,
            ctx,
            state: Mutex::new(State {
                slot: Slot::empty(),
                attempts: 0,
            }),
            settled: Condvar::new(),
            in_flight: AtomicBool::new(false),
            errors: AtomicU32::new(0),
        });
        if populate {
            Inner::update(&inner);
        }
        Self { inner }
    }

    /// The cached value, possibly stale.
    ///
    /// Blocks only while the reference is empty, until the running
    /// attempt finishes. If that attempt leaves it empty the result is
    /// [`AwaitError::NotPopulated`].
    pub fn get(&self) -> Result<R::Value> {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        if let Some(value) = state.slot.fresh(inner.now(), inner.config.ttl()) {
            return Ok(value.clone());
        }
        if let Some(stale) = state.slot.value().cloned() {
            drop(state);
            Inner::update(inner);
            return Ok(stale);
        }

        let seen = state.attempts;
        drop(state);
        Inner::update(inner);

        let mut state = inner.state.lock();
        while state.slot.value().is_none() && state.attempts == seen {
            inner.settled.wait(&mut state);
        }
        match state.slot.value() {
            Some(value) => Ok(value.clone()),
            None => Err(AwaitError::NotPopulated {
                name: inner.name.clone(),
                errors: inner.errors.load(Ordering::Acquire),
            }),
        }
    }

    /// The cached value without ever blocking; starts a refresh when
    /// empty or stale.
    pub fn try_get(&self) -> Option<R::Value> {
        let inner = &self.inner;
        let state = inner.state.lock();
        if let Some(value) = state.slot.fresh(inner.now(), inner.config.ttl()) {
            return Some(value.clone());
        }
        let current = state.slot.value().cloned();
        drop(state);
        Inner::update(inner);
        current
    }

    /// Start a background refresh unless one is already running.
    pub fn update(&self) {
        Inner::update(&self.inner);
    }

    pub fn set(&self, value: R::Value) {
        self.inner.store(Some(value));
    }

    pub fn flush(&self) {
        self.inner.store(None);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().slot.value().is_none()
    }

    pub fn last_set_at(&self) -> Option<u64> {
        self.inner.state.lock().slot.last_set()
    }

    /// Failed attempts since the last success.
    pub fn consecutive_errors(&self) -> u32 {
        self.inner.errors.load(Ordering::Acquire)
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl<R> Inner<R>
where
    R: Refresh + 'static,
    R::Value: Send + 'static,
    R::Error: Into<BoxError>,
{
    fn now(&self) -> u64 {
        self.ctx.clock.now_millis()
    }

    fn store(&self, value: Option<R::Value>) {
        let now = self.now();
        self.state.lock().slot.store(value, now);
        self.settled.notify_all();
    }

    fn update(this: &Arc<Self>) {
        if this
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let task = Arc::clone(this);
        let job_name = format!("refresh-{}", this.name);
        if let Err(e) = this
            .ctx
            .launcher
            .launch(&job_name, Box::new(move || task.run()))
        {
            let errors = this.errors.fetch_add(1, Ordering::AcqRel) + 1;
            this.ctx.reporter.report(&this.failure_context(errors), &e);
            this.finish_attempt();
        }
    }

    fn run(&self) {
        let errors = self.errors.load(Ordering::Acquire);
        if errors > 0 {
            let delay = backoff_delay(
                errors,
                self.config.backoff_base(),
                self.config.backoff_max_exponent,
            );
            debug!(name = %self.name, errors, delay_ms = delay.as_millis() as u64, "backing off before refresh");
            self.ctx.clock.sleep(delay);
        }

        match panic::catch_unwind(AssertUnwindSafe(|| self.source.refresh())) {
            Ok(Ok(value)) => {
                self.errors.store(0, Ordering::Release);
                self.store(Some(value));
                debug!(name = %self.name, "background refresh succeeded");
            }
            Ok(Err(e)) => {
                let errors = self.errors.fetch_add(1, Ordering::AcqRel) + 1;
                let e: BoxError = e.into();
                self.ctx
                    .reporter
                    .report(&self.failure_context(errors), &*e);
            }
            Err(payload) => {
                let errors = self.errors.fetch_add(1, Ordering::AcqRel) + 1;
                self.ctx.reporter.report_message(&format!(
                    "{}: panicked: {}",
                    self.failure_context(errors),
                    panic_message(payload.as_ref())
                ));
            }
        }

        self.finish_attempt();
    }

    fn finish_attempt(&self) {
        let mut state = self.state.lock();
        state.attempts += 1;
        self.in_flight.store(false, Ordering::Release);
        drop(state);
        self.settled.notify_all();
    }

    fn failure_context(&self, errors: u32) -> String {
        format!("refresh '{}' failed ({} in a row)", self.name, errors)
    }
}
