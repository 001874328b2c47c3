//! Background task launchers
//!
//! A [`Launcher`] runs a unit of work somewhere other than the calling
//! thread. [`ThreadLauncher`] starts one named OS thread per job;
//! [`TokioLauncher`] hands jobs to a tokio runtime's blocking pool so
//! repeated launches reuse a bounded set of workers.

use tokio::runtime::Handle;
use tracing::debug;

use crate::error::{AwaitError, Result};

/// A boxed unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait Launcher: Send + Sync {
    /// Start `job` and return without waiting for it.
    fn launch(&self, name: &str, job: Job) -> Result<()>;
}

/// One OS thread per job.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadLauncher;

impl Launcher for ThreadLauncher {
    fn launch(&self, name: &str, job: Job) -> Result<()> {
        debug!(task = name, "spawning thread");
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(job)
            .map(|_| ())
            .map_err(|e| AwaitError::Launch {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Runs jobs on a tokio runtime's blocking thread pool.
#[derive(Debug, Clone)]
pub struct TokioLauncher {
    handle: Handle,
}

impl TokioLauncher {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is currently inside.
    ///
    /// Fails when called outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| AwaitError::Launch {
                name: "tokio".to_string(),
                reason: e.to_string(),
            })
    }
}

impl Launcher for TokioLauncher {
    fn launch(&self, name: &str, job: Job) -> Result<()> {
        debug!(task = name, "spawning on blocking pool");
        let _join = self.handle.spawn_blocking(job);
        Ok(())
    }
}
