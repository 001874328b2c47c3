//! Auto-refreshing cache references
//!
//! This module provides:
//! - [`RefreshingRef`]: recomputes inline when the cached value is stale;
//!   refresh errors go straight back to the caller
//! - [`BackgroundRefreshingRef`]: serves the previous value while a single
//!   background task recomputes; refresh errors are reported and drive
//!   exponential backoff
//! - [`backoff_delay`]: the backoff schedule used between failed attempts
//!
//! Both wrap a [`Refresh`] source, which any `Fn() -> Result<T, E>`
//! closure satisfies.

mod background;
mod backoff;
mod reference;
mod slot;

pub use background::BackgroundRefreshingRef;
pub use backoff::backoff_delay;
pub use reference::RefreshingRef;

/// Computes the current value for a refreshing reference.
pub trait Refresh: Send + Sync {
    type Value: Clone;
    type Error;

    fn refresh(&self) -> Result<Self::Value, Self::Error>;
}

impl<F, T, E> Refresh for F
where
    F: Fn() -> Result<T, E> + Send + Sync,
    T: Clone,
{
    type Value = T;
    type Error = E;

    fn refresh(&self) -> Result<T, E> {
        self()
    }
}
