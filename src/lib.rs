//! Awaitkit - bounded waiting on concurrent work and self-refreshing caches

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod context;
pub mod daemon;
pub mod error;
pub mod launcher;
pub mod pending;
pub mod refresh;
pub mod reporter;

pub use aggregate::{AggregationResult, AggregationSummary, Aggregator, Collector};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AwaitConfig, RefreshConfig, Settings};
pub use context::Context;
pub use daemon::{Daemon, DaemonRunner};
pub use error::{AwaitError, FixSuggestion, PollFault, Result};
pub use launcher::{Launcher, ThreadLauncher, TokioLauncher};
pub use pending::{channel, spawn_task, Completer, PendingFuture, Resolved, TaskHandle, TokioTask};
pub use refresh::{backoff_delay, BackgroundRefreshingRef, Refresh, RefreshingRef};
pub use reporter::{CollectingReporter, ErrorReporter, TracingReporter};
