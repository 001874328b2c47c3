//! Awaitkit CLI - drive the aggregator and refreshing references by hand

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use awaitkit::{
    spawn_task, AggregationResult, Aggregator, AwaitError, BackgroundRefreshingRef, Context,
    FixSuggestion, PendingFuture, RefreshingRef, Settings, ThreadLauncher, TokioTask,
};

type Job = Box<dyn PendingFuture<Output = u64, Error = String>>;

#[derive(Parser)]
#[command(name = "awaitkit")]
#[command(about = "Awaitkit - bounded waiting on concurrent work")]
#[command(version)]
struct Cli {
    /// Settings file (YAML); AWAITKIT_* variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RuntimeKind {
    /// One OS thread per job
    Threads,
    /// Async tasks on a tokio runtime
    Tokio,
}

#[derive(Subcommand)]
enum Commands {
    /// Start simulated jobs and aggregate them under a deadline
    Aggregate {
        /// Number of jobs
        #[arg(short, long, default_value_t = 5)]
        jobs: usize,

        /// Overall deadline in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        deadline_ms: u64,

        /// Job N takes N times this long (1-based)
        #[arg(long, default_value_t = 10)]
        step_ms: u64,

        /// Every Nth job fails (0 = none)
        #[arg(long, default_value_t = 0)]
        fail_every: usize,

        /// The last N jobs never finish
        #[arg(long, default_value_t = 0)]
        hang: usize,

        /// Stop after this many jobs resolve
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum, default_value_t = RuntimeKind::Threads)]
        runtime: RuntimeKind,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read a counting source through a refreshing reference
    Refresh {
        /// Time-to-live override in milliseconds
        #[arg(long)]
        ttl_ms: Option<u64>,

        /// Number of reads
        #[arg(short, long, default_value_t = 5)]
        reads: usize,

        /// Pause between reads in milliseconds
        #[arg(short, long, default_value_t = 0)]
        interval_ms: u64,

        /// Every Nth refresh fails (0 = none)
        #[arg(long, default_value_t = 0)]
        fail_every: u64,

        /// Refresh on a background task instead of inline
        #[arg(short, long)]
        background: bool,
    },

    /// Print the effective settings
    Config,
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_settings(cli.config.as_ref()).and_then(|settings| match cli.command {
        Commands::Aggregate {
            jobs,
            deadline_ms,
            step_ms,
            fail_every,
            hang,
            limit,
            runtime,
            json,
        } => run_aggregate(
            &settings,
            JobPlan {
                jobs,
                step_ms,
                fail_every,
                hang,
            },
            Duration::from_millis(deadline_ms),
            limit,
            runtime,
            json,
        ),
        Commands::Refresh {
            ttl_ms,
            reads,
            interval_ms,
            fail_every,
            background,
        } => {
            let mut refresh = settings.refresh.clone();
            if let Some(ms) = ttl_ms {
                refresh = refresh.with_ttl(Duration::from_millis(ms));
            }
            let settings = Settings { refresh, ..settings };
            run_refresh(&settings, reads, Duration::from_millis(interval_ms), fail_every, background)
        }
        Commands::Config => show_config(&settings),
    });

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, AwaitError> {
    let settings = match path {
        Some(p) => Settings::load(p)?,
        None => Settings::default(),
    };
    settings.with_env()
}

struct JobPlan {
    jobs: usize,
    step_ms: u64,
    fail_every: usize,
    hang: usize,
}

impl JobPlan {
    fn key(i: usize) -> String {
        format!("job-{}", i + 1)
    }

    /// None for jobs that never finish.
    fn delay(&self, i: usize) -> Option<Duration> {
        if i + self.hang >= self.jobs {
            None
        } else {
            Some(Duration::from_millis(self.step_ms * (i as u64 + 1)))
        }
    }

    fn outcome(&self, i: usize) -> Result<u64, String> {
        if self.fail_every > 0 && (i + 1) % self.fail_every == 0 {
            Err(format!("{} failed", Self::key(i)))
        } else {
            Ok((i as u64 + 1) * 10)
        }
    }
}

const FOREVER: Duration = Duration::from_secs(24 * 60 * 60);

fn run_aggregate(
    settings: &Settings,
    plan: JobPlan,
    deadline: Duration,
    limit: Option<usize>,
    runtime: RuntimeKind,
    json: bool,
) -> Result<(), AwaitError> {
    // Polling a TokioTask blocks on the runtime, so the runtime is driven
    // from this thread rather than entered through #[tokio::main].
    let rt = match runtime {
        RuntimeKind::Tokio => Some(
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?,
        ),
        RuntimeKind::Threads => None,
    };

    let mut pending: Vec<(String, Job)> = Vec::with_capacity(plan.jobs);
    for i in 0..plan.jobs {
        let key = JobPlan::key(i);
        let delay = plan.delay(i).unwrap_or(FOREVER);
        let outcome = plan.outcome(i);
        let job: Job = match &rt {
            Some(rt) => Box::new(TokioTask::spawn(rt.handle(), key.clone(), async move {
                tokio::time::sleep(delay).await;
                outcome
            })),
            None => Box::new(spawn_task(&ThreadLauncher, &key, move || {
                std::thread::sleep(delay);
                outcome
            })?),
        };
        pending.push((key, job));
    }

    let aggregator = Aggregator::from_context(settings.aggregate.clone(), &Context::new());
    let result = match limit {
        Some(max) => aggregator.aggregate_with_limit(pending, max, deadline)?,
        None => aggregator.aggregate(pending, deadline)?,
    };

    if json {
        print_json(&result)?;
    } else {
        print_report(&result);
    }

    // Hanging tokio jobs are aborted here instead of holding the process.
    if let Some(rt) = rt {
        rt.shutdown_background();
    }
    Ok(())
}

fn sorted_keys<'a>(items: impl Iterator<Item = &'a String>) -> Vec<&'a String> {
    let mut keys: Vec<_> = items.collect();
    keys.sort();
    keys
}

fn print_report(result: &AggregationResult<String, Job>) {
    let successes: BTreeMap<_, _> = result.successes().iter().collect();
    for (key, value) in &successes {
        println!("  {} {} = {}", "✓".green(), key, value);
    }
    let failures: BTreeMap<_, _> = result.failures().iter().collect();
    for (key, error) in &failures {
        println!("  {} {}: {}", "✗".red(), key, error);
    }
    for key in sorted_keys(result.timed_out_keys()) {
        println!("  {} {} timed out", "⏱".yellow(), key);
    }
    for key in sorted_keys(result.abandoned().iter().map(|(k, _)| k)) {
        println!("  {} {} abandoned", "→".cyan(), key);
    }
    println!(
        "{} {} in {}ms",
        "Result:".cyan().bold(),
        result,
        result.elapsed().as_millis()
    );
}

fn print_json(result: &AggregationResult<String, Job>) -> Result<(), AwaitError> {
    let successes: BTreeMap<_, _> = result.successes().iter().collect();
    let failures: BTreeMap<_, _> = result.failures().iter().collect();
    let doc = serde_json::json!({
        "summary": result.summary(),
        "successes": successes,
        "failures": failures,
        "timeouts": sorted_keys(result.timed_out_keys()),
        "abandoned": sorted_keys(result.abandoned().iter().map(|(k, _)| k)),
    });
    let text = serde_json::to_string_pretty(&doc).map_err(|e| AwaitError::Config {
        reason: format!("Failed to serialize result: {}", e),
    })?;
    println!("{}", text);
    Ok(())
}

fn run_refresh(
    settings: &Settings,
    reads: usize,
    interval: Duration,
    fail_every: u64,
    background: bool,
) -> Result<(), AwaitError> {
    let calls = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&calls);
    let source = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if fail_every > 0 && n % fail_every == 0 {
            Err(format!("refresh #{} failed", n))
        } else {
            Ok(n)
        }
    };

    let mode = if background { "background" } else { "inline" };
    println!(
        "{} ttl={}ms mode={}",
        "→".cyan(),
        settings.refresh.ttl_ms,
        mode.cyan()
    );

    if background {
        let reference =
            BackgroundRefreshingRef::new("demo", source, settings.refresh.clone(), Context::new());
        for i in 1..=reads {
            match reference.get() {
                Ok(value) => println!("  read {}: {}", i, value),
                Err(e) => println!("  read {}: {}", i, e.to_string().red()),
            }
            std::thread::sleep(interval);
        }
    } else {
        let reference = RefreshingRef::from_context("demo", source, &settings.refresh, &Context::new());
        for i in 1..=reads {
            match reference.get() {
                Ok(value) => println!("  read {}: {}", i, value),
                Err(e) => println!("  read {}: {}", i, e.red()),
            }
            std::thread::sleep(interval);
        }
    }

    println!(
        "{} {} refresh call(s)",
        "Result:".cyan().bold(),
        calls.load(Ordering::SeqCst)
    );
    Ok(())
}

fn show_config(settings: &Settings) -> Result<(), AwaitError> {
    print!("{}", settings.to_yaml()?);
    Ok(())
}
