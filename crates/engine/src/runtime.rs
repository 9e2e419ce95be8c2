//! Runtime entry point
//!
//! A [`Runtime`] owns everything process-wide state would otherwise hold:
//! the configuration, the iteration id counter and active-iteration table,
//! and the accumulated statistics. Build one with [`Runtime::builder`] or
//! [`Runtime::new`], then call [`Runtime::foreach`].

use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::driver::{Driver, Task};
use crate::stats::{ForeachReport, RuntimeTotals};
use amorph_concurrency::{ConflictPolicy, IterationManager};
use amorph_core::{ConfigError, ExecutionError, InvocationId, IterationError, Result};
use amorph_worklist::Schedule;
use parking_lot::Mutex;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, info_span};

/// Speculative parallel loop runtime
///
/// # Example
///
/// ```
/// use amorph_engine::{Runtime, SpecCell};
/// use amorph_worklist::Schedule;
///
/// let runtime = Runtime::builder().threads(4).build().unwrap();
/// let total = SpecCell::new(0u64);
///
/// let report = runtime
///     .foreach(1..=100u64, Schedule::fifo(), |n, ctx| {
///         total.update(ctx, |t| *t += n)?;
///         Ok(())
///     })
///     .unwrap();
///
/// assert_eq!(total.into_inner(), 5050);
/// assert_eq!(report.committed, 100);
/// ```
pub struct Runtime {
    config: RuntimeConfig,
    manager: IterationManager,
    totals: Mutex<RuntimeTotals>,
    /// Held for the duration of an invocation
    running: Mutex<()>,
}

impl Runtime {
    /// Create a runtime from a validated configuration
    pub fn new(config: RuntimeConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let manager = IterationManager::new(config.effective_threads(), config.conflict_policy);
        Ok(Runtime {
            config,
            manager,
            totals: Mutex::new(RuntimeTotals::default()),
            running: Mutex::new(()),
        })
    }

    /// Start building a runtime from the default configuration
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Runtime configured from defaults plus `AMORPH_*` environment variables
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Self::builder().env()?.build()
    }

    /// Configuration in force
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Workers each invocation uses
    pub fn threads(&self) -> usize {
        self.config.effective_threads()
    }

    /// Conflict policy in force
    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.manager.policy()
    }

    /// Chunked FIFO with the configured chunk size
    pub fn default_schedule<T>(&self) -> Schedule<T> {
        Schedule::chunked(self.config.default_chunk_size)
    }

    /// Statistics accumulated over every invocation so far
    pub fn totals(&self) -> RuntimeTotals {
        self.totals.lock().clone()
    }

    /// Run `body` over `initial` and everything the body adds
    ///
    /// Items are handed out in the order `schedule` describes. Each call of
    /// `body` runs as a speculative iteration: it acquires the shared
    /// objects it touches through the [`Context`], and on a conflict its
    /// effects are undone and the item is retried. Conflicts and not-useful
    /// aborts never reach the caller.
    ///
    /// Returns once the worklist is empty and no iteration is running, or
    /// with the first invariant violation or panic raised by a body. Only
    /// one invocation may run on a runtime at a time.
    pub fn foreach<'env, T, I, F>(
        &self,
        initial: I,
        schedule: Schedule<T>,
        body: F,
    ) -> Result<ForeachReport>
    where
        T: Send,
        I: IntoIterator<Item = T>,
        F: Fn(&T, &mut Context<'_, 'env, T>) -> std::result::Result<(), IterationError> + Sync,
    {
        let _running = self.running.try_lock().ok_or_else(|| {
            ExecutionError::ResourceExhausted("runtime is already running a foreach".to_string())
        })?;

        let invocation = InvocationId::new();
        let threads = self.threads();
        let span = info_span!("foreach", %invocation, threads, %schedule);
        let _enter = span.enter();
        let started = Instant::now();

        let worklist = match schedule.build::<Task<T>>(threads) {
            Ok(worklist) => worklist,
            Err(e) => {
                error!(error = %e, "invalid schedule");
                self.totals.lock().failed_invocations += 1;
                return Err(e.into());
            }
        };
        let driver = Driver::new(worklist, &self.manager, self.config.spin_limit);
        let loaded = driver.load(initial);
        debug!(items = loaded, "initial items queued");

        let (stats, failure) = driver.run(threads, &body);
        let rounds = driver.rounds();
        self.totals.lock().add(&stats, rounds, failure.is_some());

        if let Some(e) = failure {
            error!(error = %e, committed = stats.committed, "foreach failed");
            return Err(e);
        }

        let report = ForeachReport::new(invocation, threads, &stats, rounds, started.elapsed());
        info!(
            committed = report.committed,
            aborted = report.aborted(),
            rounds,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "foreach complete"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("iterations", &self.manager.allocated())
            .finish()
    }
}

/// Builder for [`Runtime`]
///
/// Setters override whatever the configuration source provided.
///
/// ```
/// use amorph_engine::{ConflictPolicy, Runtime};
///
/// let runtime = Runtime::builder()
///     .threads(2)
///     .conflict_policy(ConflictPolicy::YoungerAborts)
///     .default_chunk_size(16)
///     .build()
///     .unwrap();
/// assert_eq!(runtime.threads(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
}

impl RuntimeBuilder {
    /// Builder starting from [`RuntimeConfig::default`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a TOML file
    pub fn config_file(mut self, path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        self.config = RuntimeConfig::from_file(path)?;
        Ok(self)
    }

    /// Apply `AMORPH_*` environment overrides
    pub fn env(mut self) -> std::result::Result<Self, ConfigError> {
        self.config = self.config.with_env()?;
        Ok(self)
    }

    /// Number of worker threads
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = threads;
        self
    }

    /// Conflict policy
    pub fn conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.config.conflict_policy = policy;
        self
    }

    /// Chunk size of the default schedule
    pub fn default_chunk_size(mut self, size: usize) -> Self {
        self.config.default_chunk_size = size;
        self
    }

    /// Run every invocation on the calling thread
    pub fn serial(mut self, serial: bool) -> Self {
        self.config.serial = serial;
        self
    }

    /// Idle backoff steps before a worker starts sleeping
    pub fn spin_limit(mut self, steps: u32) -> Self {
        self.config.spin_limit = steps;
        self
    }

    /// Validate the configuration and create the runtime
    pub fn build(self) -> std::result::Result<Runtime, ConfigError> {
        Runtime::new(self.config)
    }
}
