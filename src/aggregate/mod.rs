//! Bounded aggregation of in-flight computations
//!
//! An [`Aggregator`] takes ownership of a batch of [`PendingFuture`]s and
//! resolves them on the calling thread:
//!
//! - each scan gives every remaining future a short bounded wait
//!   (`poll_interval`), capped by the time left before the deadline
//! - a scan that resolved nothing is followed by a `retry_delay` pause
//! - futures still running at the deadline are returned as timeouts
//!
//! The call therefore returns no later than the deadline plus one poll
//! interval. A [`PollFault`](crate::error::PollFault) from any handle
//! aborts the whole batch.
//!
//! # Example
//!
//! ```rust,ignore
//! use awaitkit::{Aggregator, spawn_task, ThreadLauncher};
//!
//! let jobs = (0..4).map(|i| {
//!     let handle = spawn_task(&ThreadLauncher, &format!("job-{i}"), move || Ok::<_, String>(i * 2))?;
//!     Ok((i, handle))
//! }).collect::<awaitkit::Result<Vec<_>>>()?;
//!
//! let result = Aggregator::with_defaults().aggregate(jobs, Duration::from_secs(5))?;
//! assert!(result.all_succeeded());
//! ```

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::AwaitConfig;
use crate::context::Context;
use crate::error::{AwaitError, BoxError, Result};
use crate::pending::PendingFuture;

mod collector;
mod result;

pub use collector::Collector;
pub use result::{AggregationResult, AggregationSummary};

/// What the per-outcome handler wants the scan loop to do next.
enum Step {
    Continue,
    Stop,
}

/// How a scan loop ended.
enum Ended {
    Drained,
    Stopped,
    Deadline(Duration),
}

pub struct Aggregator {
    config: AwaitConfig,
    clock: Arc<dyn Clock>,
}

impl Aggregator {
    pub fn new(config: AwaitConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Default timing on the system clock.
    pub fn with_defaults() -> Self {
        Self::new(AwaitConfig::default(), Arc::new(SystemClock::new()))
    }

    pub fn from_context(config: AwaitConfig, ctx: &Context) -> Self {
        Self::new(config, Arc::clone(&ctx.clock))
    }

    pub fn config(&self) -> &AwaitConfig {
        &self.config
    }

    /// Resolve every future or give up at `deadline`.
    pub fn aggregate<K, F, I>(&self, pending: I, deadline: Duration) -> Result<AggregationResult<K, F>>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Eq + Hash + Debug,
        F: PendingFuture,
    {
        self.collect_buckets(pending, None, deadline)
    }

    /// Like [`aggregate`](Self::aggregate), but return as soon as
    /// `max_results` futures have succeeded or failed.
    ///
    /// Futures still running at that point are not timeouts; they are
    /// handed back in [`AggregationResult::abandoned`].
    pub fn aggregate_with_limit<K, F, I>(
        &self,
        pending: I,
        max_results: usize,
        deadline: Duration,
    ) -> Result<AggregationResult<K, F>>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Eq + Hash + Debug,
        F: PendingFuture,
    {
        self.collect_buckets(pending, Some(max_results), deadline)
    }

    /// Return the first successful value.
    ///
    /// A failure from any future aborts with [`AwaitError::TaskFailed`];
    /// reaching the deadline first is [`AwaitError::Timeout`]. An empty
    /// batch yields `Ok(None)`.
    pub fn await_first<K, F, I>(&self, pending: I, deadline: Duration) -> Result<Option<(K, F::Output)>>
    where
        I: IntoIterator<Item = (K, F)>,
        K: std::fmt::Debug,
        F: PendingFuture,
        F::Error: Into<BoxError>,
    {
        let mut pending: Vec<(K, F)> = pending.into_iter().collect();
        let mut first = None;

        let ended = self.scan(&mut pending, deadline, |key, outcome| match outcome {
            Ok(value) => {
                first = Some((key, value));
                Ok(Step::Stop)
            }
            Err(e) => Err(AwaitError::task_failed(&key, e)),
        })?;

        match ended {
            Ended::Deadline(elapsed) => Err(AwaitError::Timeout {
                elapsed,
                pending: pending.len(),
            }),
            Ended::Drained | Ended::Stopped => Ok(first),
        }
    }

    /// Append every future's items to `sink` until all are resolved or
    /// `sink` holds at least `max_results` items.
    ///
    /// On failure or timeout the items gathered so far stay in `sink`.
    pub fn await_and_collect<K, F, I, T, C>(
        &self,
        pending: I,
        max_results: usize,
        deadline: Duration,
        sink: &mut C,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, F)>,
        K: std::fmt::Debug,
        F: PendingFuture,
        F::Output: IntoIterator<Item = T>,
        F::Error: Into<BoxError>,
        C: Collector<T>,
    {
        let mut pending: Vec<(K, F)> = pending.into_iter().collect();
        if sink.count() >= max_results {
            return Ok(());
        }

        let ended = self.scan(&mut pending, deadline, |key, outcome| match outcome {
            Ok(items) => {
                sink.add_all(items);
                if sink.count() >= max_results {
                    Ok(Step::Stop)
                } else {
                    Ok(Step::Continue)
                }
            }
            Err(e) => Err(AwaitError::task_failed(&key, e)),
        })?;

        match ended {
            Ended::Deadline(elapsed) => Err(AwaitError::Timeout {
                elapsed,
                pending: pending.len(),
            }),
            Ended::Drained | Ended::Stopped => Ok(()),
        }
    }

    fn collect_buckets<K, F, I>(
        &self,
        pending: I,
        max_results: Option<usize>,
        deadline: Duration,
    ) -> Result<AggregationResult<K, F>>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Eq + Hash + Debug,
        F: PendingFuture,
    {
        let start = self.clock.now_millis();
        let mut pending: Vec<(K, F)> = pending.into_iter().collect();
        check_unique(&pending)?;
        let mut result = AggregationResult::new();
        let mut resolved = 0usize;

        let quota_met = |resolved: usize| max_results.is_some_and(|max| resolved >= max);

        let ended = if quota_met(0) {
            Ended::Stopped
        } else {
            self.scan(&mut pending, deadline, |key, outcome| {
                match outcome {
                    Ok(value) => result.success(key, value),
                    Err(e) => result.fail(key, e),
                }
                resolved += 1;
                Ok(if quota_met(resolved) {
                    Step::Stop
                } else {
                    Step::Continue
                })
            })?
        };

        match ended {
            Ended::Deadline(_) => result.timeout(pending),
            Ended::Stopped => result.abandon(pending),
            Ended::Drained => {}
        }
        result.finish(self.clock.elapsed_since(start));

        debug!(
            successes = result.num_successes(),
            failures = result.num_failures(),
            timeouts = result.num_timeouts(),
            abandoned = result.abandoned().len(),
            elapsed_ms = result.elapsed().as_millis() as u64,
            "aggregation finished"
        );
        Ok(result)
    }

    /// Scan `pending` until it drains, the handler says stop, or the
    /// deadline passes. Resolved futures are removed; the rest stay in
    /// supply order.
    fn scan<K, F, H>(&self, pending: &mut Vec<(K, F)>, deadline: Duration, mut on_ready: H) -> Result<Ended>
    where
        F: PendingFuture,
        H: FnMut(K, std::result::Result<F::Output, F::Error>) -> Result<Step>,
    {
        let start = self.clock.now_millis();
        let poll_interval = self.config.poll_interval();
        let mut pass = 0u64;

        loop {
            if pending.is_empty() {
                return Ok(Ended::Drained);
            }
            pass += 1;
            let mut progressed = 0usize;
            let mut i = 0;

            while i < pending.len() {
                let elapsed = self.clock.elapsed_since(start);
                if elapsed >= deadline {
                    return Ok(Ended::Deadline(elapsed));
                }
                let wait = poll_interval.min(deadline - elapsed);

                match pending[i].1.wait_for(wait)? {
                    Poll::Pending => i += 1,
                    Poll::Ready(outcome) => {
                        let (key, _done) = pending.remove(i);
                        progressed += 1;
                        if let Step::Stop = on_ready(key, outcome)? {
                            return Ok(Ended::Stopped);
                        }
                    }
                }
            }

            debug!(pass, progressed, remaining = pending.len(), "scan complete");

            if pending.is_empty() {
                return Ok(Ended::Drained);
            }
            let elapsed = self.clock.elapsed_since(start);
            if elapsed >= deadline {
                return Ok(Ended::Deadline(elapsed));
            }
            if progressed == 0 {
                self.clock
                    .sleep(self.config.retry_delay().min(deadline - elapsed));
            }
        }
    }
}

/// Each key must name exactly one future, or buckets would collide.
fn check_unique<K: Eq + Hash + Debug, F>(pending: &[(K, F)]) -> Result<()> {
    let mut seen = HashSet::with_capacity(pending.len());
    match pending.iter().find(|(key, _)| !seen.insert(key)) {
        Some((key, _)) => Err(AwaitError::DuplicateKey {
            key: format!("{:?}", key),
        }),
        None => Ok(()),
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::with_defaults()
    }
}
