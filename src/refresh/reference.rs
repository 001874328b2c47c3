use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use super::slot::Slot;
use super::Refresh;
use crate::clock::{Clock, SystemClock};
use crate::config::RefreshConfig;
use crate::context::Context;

/// A cached value recomputed inline once it is older than `ttl`.
///
/// Reads, writes and the refresh itself share one lock, so concurrent
/// callers queue behind a refresh and all see its result. A failed
/// refresh is returned to the caller that triggered it and leaves the
/// slot exactly as it was, timestamp included, so the next `get` retries.
pub struct RefreshingRef<R: Refresh> {
    name: String,
    source: R,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<Slot<R::Value>>,
}

impl<R: Refresh> RefreshingRef<R> {
    pub fn new(name: impl Into<String>, source: R, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            source,
            ttl,
            clock,
            slot: Mutex::new(Slot::empty()),
        }
    }

    /// System clock, given time-to-live.
    pub fn with_ttl(name: impl Into<String>, source: R, ttl: Duration) -> Self {
        Self::new(name, source, ttl, Arc::new(SystemClock::new()))
    }

    pub fn from_context(
        name: impl Into<String>,
        source: R,
        config: &RefreshConfig,
        ctx: &Context,
    ) -> Self {
        Self::new(name, source, config.ttl(), Arc::clone(&ctx.clock))
    }

    /// The cached value, refreshed first if empty or stale.
    pub fn get(&self) -> Result<R::Value, R::Error> {
        let mut slot = self.slot.lock();
        if let Some(value) = slot.fresh(self.clock.now_millis(), self.ttl) {
            return Ok(value.clone());
        }

        debug!(name = %self.name, "refreshing stale value");
        let value = self.source.refresh()?;
        slot.store(Some(value.clone()), self.clock.now_millis());
        Ok(value)
    }

    /// Overwrite the cached value without calling the source.
    pub fn set(&self, value: R::Value) {
        self.slot.lock().store(Some(value), self.clock.now_millis());
    }

    /// Drop the cached value; the next `get` refreshes.
    pub fn flush(&self) {
        self.slot.lock().store(None, self.clock.now_millis());
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().value().is_none()
    }

    /// The cached value as-is, stale or not, without refreshing.
    pub fn peek(&self) -> Option<R::Value> {
        self.slot.lock().value().cloned()
    }

    /// Clock reading of the last store, if any.
    pub fn last_set_at(&self) -> Option<u64> {
        self.slot.lock().last_set()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
