//! Time sources
//!
//! Everything that measures elapsed time or sleeps goes through a [`Clock`]
//! so deadlines, staleness and backoff can be driven deterministically in
//! tests with a [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A source of "now" as integer milliseconds, plus a way to wait.
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_millis(&self) -> u64;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);

    /// Milliseconds elapsed since `start`, saturating at zero.
    fn elapsed_since(&self, start: u64) -> Duration {
        Duration::from_millis(self.now_millis().saturating_sub(start))
    }
}

/// Monotonic wall time measured from the moment the clock was created.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// A clock that only moves when told to.
///
/// `sleep` advances the clock by the requested amount instead of blocking,
/// and remembers every request so backoff schedules can be asserted.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at `millis`.
    pub fn starting_at(millis: u64) -> Self {
        Self {
            now: AtomicU64::new(millis),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Every duration passed to [`Clock::sleep`] so far, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration);
        std::thread::yield_now();
    }
}
