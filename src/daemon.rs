//! Periodic background loops
//!
//! A [`Daemon`] describes the work; a [`DaemonRunner`] owns the thread
//! that repeats it:
//!
//! 1. `on_start`, then an optional startup delay
//! 2. `init` once
//! 3. `process`, sleep `sleep_time`, repeat until stopped
//! 4. `on_stop`, always
//!
//! An error or panic from any hook ends the loop and is logged. `stop`
//! wakes the loop out of its sleep instead of waiting the interval out.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::context::Context;
use crate::error::{AwaitError, Result};
use crate::launcher::Launcher;
use crate::pending::panic_message;

const NEVER: u64 = u64::MAX;

/// Work repeated by a [`DaemonRunner`].
pub trait Daemon: Send + 'static {
    /// Pause between the end of one `process` call and the next.
    fn sleep_time(&self) -> Duration;

    fn startup_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn on_start(&mut self) {}

    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn process(&mut self) -> anyhow::Result<()>;

    fn on_stop(&mut self) {}
}

struct Shared {
    stop: Mutex<bool>,
    wake: Condvar,
    alive: AtomicBool,
    done: AtomicBool,
    last_process: AtomicU64,
}

impl Shared {
    /// Sleep up to `delay`; false if asked to stop meanwhile.
    fn nap(&self, delay: Duration) -> bool {
        let mut stop = self.stop.lock();
        if !*stop && !delay.is_zero() {
            self.wake.wait_while_for(&mut stop, |s| !*s, delay);
        }
        !*stop
    }

    fn stopping(&self) -> bool {
        *self.stop.lock()
    }
}

pub struct DaemonRunner<D: Daemon> {
    name: String,
    sleep_time: Duration,
    daemon: Mutex<Option<D>>,
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
    launcher: Arc<dyn Launcher>,
}

impl<D: Daemon> DaemonRunner<D> {
    pub fn new(name: impl Into<String>, daemon: D, ctx: &Context) -> Self {
        Self {
            name: name.into(),
            sleep_time: daemon.sleep_time(),
            daemon: Mutex::new(Some(daemon)),
            shared: Arc::new(Shared {
                stop: Mutex::new(false),
                wake: Condvar::new(),
                alive: AtomicBool::new(false),
                done: AtomicBool::new(false),
                last_process: AtomicU64::new(NEVER),
            }),
            clock: Arc::clone(&ctx.clock),
            launcher: Arc::clone(&ctx.launcher),
        }
    }

    /// Launch the loop. A runner starts at most once; later calls warn
    /// and do nothing.
    pub fn start(&self) -> Result<()> {
        info!("{}: Starting daemon", self.name);
        let Some(daemon) = self.daemon.lock().take() else {
            warn!("{}: daemon was already started, not starting it again", self.name);
            return Ok(());
        };

        self.shared.alive.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let clock = Arc::clone(&self.clock);
        let name = self.name.clone();
        let launched = self.launcher.launch(
            &self.name,
            Box::new(move || run_loop(&name, daemon, &shared, clock.as_ref())),
        );
        if launched.is_err() {
            self.shared.alive.store(false, Ordering::Release);
            self.shared.done.store(true, Ordering::Release);
        }
        launched
    }

    /// Ask the loop to exit after the current `process` call.
    pub fn stop(&self) {
        if !self.is_alive() {
            warn!("{}: daemon is already stopped", self.name);
        }
        self.shared.done.store(true, Ordering::Release);
        *self.shared.stop.lock() = true;
        self.shared.wake.notify_all();
    }

    /// Stop and wait up to `wait` for the loop to finish.
    pub fn stop_and_join(&self, wait: Duration) -> Result<()> {
        self.stop();
        let start = self.clock.now_millis();
        while self.is_alive() {
            if self.clock.elapsed_since(start) >= wait {
                return Err(AwaitError::DaemonStuck {
                    name: self.name.clone(),
                    wait,
                });
            }
            self.clock.sleep(Duration::from_millis(25).min(wait));
        }
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        self.shared.done.load(Ordering::Acquire)
    }

    /// Clock reading after the last successful `process`, if any.
    pub fn last_process_time(&self) -> Option<u64> {
        match self.shared.last_process.load(Ordering::Acquire) {
            NEVER => None,
            t => Some(t),
        }
    }

    pub fn status(&self) -> String {
        let last = self
            .last_process_time()
            .map_or_else(|| "never".to_string(), |t| format!("{}ms", t));
        format!(
            "isDone={}\nlastProcessTime={}\nsleepTime={}ms",
            self.is_done(),
            last,
            self.sleep_time.as_millis()
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn run_loop<D: Daemon>(name: &str, mut daemon: D, shared: &Shared, clock: &dyn Clock) {
    match panic::catch_unwind(AssertUnwindSafe(|| run_body(name, &mut daemon, shared, clock))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("{}: Error in daemon, exiting: {:#}", name, e),
        Err(payload) => error!(
            "{}: Daemon panicked, exiting: {}",
            name,
            panic_message(payload.as_ref())
        ),
    }

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| daemon.on_stop())) {
        error!("{}: on_stop panicked: {}", name, panic_message(payload.as_ref()));
    }
    shared.done.store(true, Ordering::Release);
    shared.alive.store(false, Ordering::Release);
}

fn run_body<D: Daemon>(
    name: &str,
    daemon: &mut D,
    shared: &Shared,
    clock: &dyn Clock,
) -> anyhow::Result<()> {
    daemon.on_start();

    let delay = daemon.startup_delay();
    if !delay.is_zero() {
        debug!("{}: Delaying daemon startup for {}ms...", name, delay.as_millis());
        if !shared.nap(delay) {
            return Ok(());
        }
    }

    debug!("{}: Daemon thread now running", name);
    daemon.init()?;
    while !shared.stopping() {
        daemon.process()?;
        shared.last_process.store(clock.now_millis(), Ordering::Release);
        if !shared.nap(daemon.sleep_time()) {
            break;
        }
    }
    Ok(())
}
