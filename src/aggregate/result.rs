use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use serde::Serialize;

use crate::pending::PendingFuture;

/// Outcome of one aggregation call.
///
/// Every key handed to the aggregator lands in exactly one bucket:
/// `successes`, `failures`, `timeouts` (still running when the deadline
/// passed) or `abandoned` (still running when a result quota was met).
/// Timed-out and abandoned handles are returned so the caller can keep
/// waiting on them or drop them.
pub struct AggregationResult<K, F: PendingFuture> {
    successes: HashMap<K, F::Output>,
    failures: HashMap<K, F::Error>,
    timeouts: Vec<(K, F)>,
    abandoned: Vec<(K, F)>,
    elapsed: Duration,
}

/// Bucket sizes, for logs and machine-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AggregationSummary {
    pub successes: usize,
    pub failures: usize,
    pub timeouts: usize,
    pub abandoned: usize,
    pub elapsed_ms: u64,
}

impl<K: Eq + Hash, F: PendingFuture> AggregationResult<K, F> {
    pub(crate) fn new() -> Self {
        Self {
            successes: HashMap::new(),
            failures: HashMap::new(),
            timeouts: Vec::new(),
            abandoned: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn success(&mut self, key: K, value: F::Output) {
        self.successes.insert(key, value);
    }

    pub(crate) fn fail(&mut self, key: K, error: F::Error) {
        self.failures.insert(key, error);
    }

    pub(crate) fn timeout(&mut self, timed_out: Vec<(K, F)>) {
        self.timeouts.extend(timed_out);
    }

    pub(crate) fn abandon(&mut self, left: Vec<(K, F)>) {
        self.abandoned.extend(left);
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn successes(&self) -> &HashMap<K, F::Output> {
        &self.successes
    }

    pub fn failures(&self) -> &HashMap<K, F::Error> {
        &self.failures
    }

    /// Handles still unresolved at the deadline, in the order supplied.
    pub fn timeouts(&self) -> &[(K, F)] {
        &self.timeouts
    }

    pub fn timed_out_keys(&self) -> impl Iterator<Item = &K> {
        self.timeouts.iter().map(|(k, _)| k)
    }

    /// Handles left unresolved because the result quota was reached.
    pub fn abandoned(&self) -> &[(K, F)] {
        &self.abandoned
    }

    pub fn num_successes(&self) -> usize {
        self.successes.len()
    }

    pub fn num_failures(&self) -> usize {
        self.failures.len()
    }

    pub fn num_timeouts(&self) -> usize {
        self.timeouts.len()
    }

    pub fn timed_out(&self) -> bool {
        !self.timeouts.is_empty()
    }

    /// No failures and nothing left running.
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.timeouts.is_empty() && self.abandoned.is_empty()
    }

    /// Time spent inside the aggregation call.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn summary(&self) -> AggregationSummary {
        AggregationSummary {
            successes: self.successes.len(),
            failures: self.failures.len(),
            timeouts: self.timeouts.len(),
            abandoned: self.abandoned.len(),
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }

    pub fn into_successes(self) -> HashMap<K, F::Output> {
        self.successes
    }

    /// Split into `(successes, failures, timeouts, abandoned)`.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        HashMap<K, F::Output>,
        HashMap<K, F::Error>,
        Vec<(K, F)>,
        Vec<(K, F)>,
    ) {
        (self.successes, self.failures, self.timeouts, self.abandoned)
    }
}

impl<K, F: PendingFuture> fmt::Display for AggregationResult<K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "successes={}, failures={}, timeouts={}",
            self.successes.len(),
            self.failures.len(),
            self.timeouts.len()
        )?;
        if !self.abandoned.is_empty() {
            write!(f, ", abandoned={}", self.abandoned.len())?;
        }
        Ok(())
    }
}

impl<K, F> fmt::Debug for AggregationResult<K, F>
where
    K: fmt::Debug,
    F: PendingFuture,
    F::Output: fmt::Debug,
    F::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationResult")
            .field("successes", &self.successes)
            .field("failures", &self.failures)
            .field(
                "timeouts",
                &self.timeouts.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field(
                "abandoned",
                &self.abandoned.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::Resolved;

    type Res = AggregationResult<&'static str, Resolved<u32, String>>;

    #[test]
    fn test_empty_result_all_succeeded() {
        let result = Res::new();
        assert!(result.all_succeeded());
        assert!(!result.timed_out());
        assert_eq!(result.to_string(), "successes=0, failures=0, timeouts=0");
    }

    #[test]
    fn test_buckets_and_summary() {
        let mut result = Res::new();
        result.success("a", 1);
        result.fail("b", "boom".into());
        result.timeout(vec![("c", Resolved::ok(3))]);
        result.finish(Duration::from_millis(120));

        assert_eq!(result.num_successes(), 1);
        assert_eq!(result.num_failures(), 1);
        assert_eq!(result.num_timeouts(), 1);
        assert!(result.timed_out());
        assert!(!result.all_succeeded());
        assert_eq!(result.timed_out_keys().collect::<Vec<_>>(), vec![&"c"]);
        assert_eq!(
            result.summary(),
            AggregationSummary {
                successes: 1,
                failures: 1,
                timeouts: 1,
                abandoned: 0,
                elapsed_ms: 120,
            }
        );
        assert!(format!("{:?}", result).contains("timeouts: [\"c\"]"));
    }

    #[test]
    fn test_abandoned_shows_in_display() {
        let mut result = Res::new();
        result.abandon(vec![("z", Resolved::ok(0))]);
        assert!(!result.all_succeeded());
        assert_eq!(
            result.to_string(),
            "successes=0, failures=0, timeouts=0, abandoned=1"
        );
    }
}
