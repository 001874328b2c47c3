use std::time::Duration;

/// A cached value and the clock reading at which it was stored.
///
/// Both fields only ever change together through [`Slot::store`].
#[derive(Debug)]
pub(crate) struct Slot<T> {
    value: Option<T>,
    last_set: Option<u64>,
}

impl<T> Slot<T> {
    pub(crate) fn empty() -> Self {
        Self {
            value: None,
            last_set: None,
        }
    }

    pub(crate) fn store(&mut self, value: Option<T>, now: u64) {
        self.value = value;
        self.last_set = Some(now);
    }

    pub(crate) fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub(crate) fn last_set(&self) -> Option<u64> {
        self.last_set
    }

    /// The value, if present and no older than `ttl` at `now`.
    pub(crate) fn fresh(&self, now: u64, ttl: Duration) -> Option<&T> {
        let at = self.last_set?;
        let age = now.saturating_sub(at);
        if age > u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX) {
            None
        } else {
            self.value.as_ref()
        }
    }
}
