//! A runtime for building collection plugins that speak the Netdata external
//! plugin protocol.
//!
//! The crate runs many independent, periodically scheduled data collection
//! jobs, tracks what has been announced to the agent for each of their charts,
//! and writes chart definitions, data points and retractions to standard output.
//!
//! # Overview
//!
//! A module is a [`Collector`] implementation registered in a
//! [`ModuleRegistry`] together with its scheduling defaults. The [`Plugin`]
//! builds one [`Job`] per configured instance of every enabled module and
//! drives them:
//!
//! 1. `Init`, `Check` and `PostCheck` run concurrently for all jobs.
//! 2. Jobs that pass join the running set; jobs configured with an
//!    auto-detection retry interval join the recheck set; the rest are dropped.
//! 3. A wall-clock aligned [`Ticker`](foundation::Ticker) fans out ticks to
//!    running jobs and schedules re-checks.
//! 4. Each job collects on its own task and writes its statements in one batch.
//!
//! # Example
//!
//! ```no_run
//! use netdata_plugin_error::Result;
//! use rt::charts::{Chart, Charts, Dimension, Metrics};
//! use rt::{Collector, CollectorBase, Creator, ModuleDefaults, ModuleRegistry, Plugin, PluginConfig};
//! use serde::Deserialize;
//!
//! #[derive(Default, Deserialize)]
//! struct Uptime {
//!     #[serde(skip)]
//!     base: CollectorBase,
//! }
//!
//! impl Collector for Uptime {
//!     fn base(&self) -> &CollectorBase {
//!         &self.base
//!     }
//!
//!     fn base_mut(&mut self) -> &mut CollectorBase {
//!         &mut self.base
//!     }
//!
//!     fn init(&mut self) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn check(&mut self) -> bool {
//!         true
//!     }
//!
//!     fn charts(&mut self) -> Option<Charts> {
//!         Charts::new()
//!             .with(Chart::new("uptime").with_dim(Dimension::new("seconds")))
//!             .ok()
//!     }
//!
//!     fn collect(&mut self, _charts: &mut Charts) -> Option<Metrics> {
//!         Some([("seconds".to_string(), 42)].into_iter().collect())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let mut modules = ModuleRegistry::new();
//!     modules.register("uptime", Creator::from_config::<Uptime>(ModuleDefaults::default()))?;
//!
//!     Plugin::new("go.d", PluginConfig::default(), modules).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Concurrency Model
//!
//! - One coordinating task owns the ticker and the main loop
//! - Every running job owns one task; its chart state is never touched elsewhere
//! - Collector calls run on blocking threads, so a panicking or hung collector
//!   cannot stall the scheduler or other jobs
//! - Ticks are never queued: a job still busy with its previous cycle misses them

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use foundation::Ticker;
use netdata_plugin_error::{NetdataPluginError, Result};
use netdata_plugin_protocol::ApiWriter;
use tokio::io::AsyncWrite;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod charts;

mod collector;
pub use collector::{Collector, CollectorBase};

mod config;
pub use config::{JobConfig, MODULE_NAME_PREFIX, ModuleConfig, PluginConfig};

mod job;
pub use job::{CHECK_TIMEOUT, Job, JobTask, RunningJob, SharedWriter, shared_writer};

mod modules;
pub use modules::{Creator, ModuleDefaults, ModuleRegistry};

pub mod netdata_env;
pub use netdata_env::{LogLevel, NetdataEnv};

mod registry;
pub use registry::JobRegistry;

mod tracing_setup;
pub use tracing_setup::init_tracing;

#[cfg(test)]
mod test_util;

/// How long shutdown waits for jobs to retract their charts.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A job waiting for its auto-detection retry.
///
/// The job sits behind an async mutex so at most one re-check of it is in
/// flight; the slot is emptied when the job is promoted or given up on.
#[derive(Clone)]
struct PendingJob {
    retry: u64,
    job: Arc<tokio::sync::Mutex<Option<Job>>>,
}

/// Result of the initial `Init`/`Check`/`PostCheck` sequence.
enum Preparation {
    Ready,
    CheckFailed,
    Failed,
}

async fn prepare(job: &mut Job) -> Preparation {
    if let Err(e) = job.init().await {
        warn!(parent: job.span(), "init failed: {}", e);
        return Preparation::Failed;
    }
    if !job.check().await {
        return Preparation::CheckFailed;
    }
    if !job.post_check().await {
        return Preparation::Failed;
    }
    Preparation::Ready
}

/// Hand a prepared job to the running set and start its task.
///
/// A job whose full name is already running is dropped.
fn start_job(
    job: Job,
    running: &JobRegistry<Arc<RunningJob>>,
    writer: &SharedWriter,
    fatal: &CancellationToken,
) -> bool {
    let name = job.full_name().to_string();
    let (handle, task) = job.into_running(Arc::clone(writer), fatal.clone());
    let handle = Arc::new(handle);

    if !running.put_if_not_exist(&name, Arc::clone(&handle)) {
        warn!(job = %name, "a job with the same name is already running, dropping it");
        return false;
    }

    handle.attach(task.spawn());
    true
}

/// The orchestrator of a collection plugin.
///
/// Owns the module registry, the configuration, the two job registries and
/// the protocol output. See the crate documentation for the lifecycle.
pub struct Plugin {
    name: String,
    config: PluginConfig,
    modules: ModuleRegistry,
    module_configs: BTreeMap<String, ModuleConfig>,
    module_filter: Option<String>,
    min_update_every: u64,
    tick_interval: Duration,

    writer: SharedWriter,
    running: Arc<JobRegistry<Arc<RunningJob>>>,
    recheck: Arc<JobRegistry<PendingJob>>,

    /// Token for initiating graceful shutdown.
    shutdown: CancellationToken,
    /// Cancelled by a job that failed to write to the output stream.
    fatal: CancellationToken,
}

impl Plugin {
    /// Create a plugin writing to stdout.
    pub fn new(name: &str, config: PluginConfig, modules: ModuleRegistry) -> Self {
        Self {
            name: name.to_string(),
            config,
            modules,
            module_configs: BTreeMap::new(),
            module_filter: None,
            min_update_every: 1,
            tick_interval: Duration::from_secs(1),
            writer: shared_writer(tokio::io::stdout()),
            running: Arc::new(JobRegistry::new()),
            recheck: Arc::new(JobRegistry::new()),
            shutdown: CancellationToken::new(),
            fatal: CancellationToken::new(),
        }
    }

    /// Write the protocol to `writer` instead of stdout.
    pub fn with_writer<W>(mut self, writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.writer = shared_writer(writer);
        self
    }

    /// Use `config` for the jobs of `module`.
    pub fn with_module_config(mut self, module: &str, config: ModuleConfig) -> Self {
        self.module_configs.insert(module.to_string(), config);
        self
    }

    /// Only build jobs of `module`. `None` or `"all"` builds every module.
    pub fn with_module_filter(mut self, module: Option<&str>) -> Self {
        self.module_filter = module.filter(|m| *m != "all").map(String::from);
        self
    }

    /// Lower bound for every job's update interval.
    pub fn with_min_update_every(mut self, min_update_every: u64) -> Self {
        self.min_update_every = min_update_every.max(1);
        self
    }

    /// Length of one clock step. One second unless testing.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full names of the running jobs, in order.
    pub fn running_jobs(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.running.len());
        self.running.range(|name, _| {
            names.push(name.to_string());
            true
        });
        names
    }

    /// Full names of the jobs waiting for auto-detection, in order.
    pub fn rechecking_jobs(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.recheck.len());
        self.recheck.range(|name, _| {
            names.push(name.to_string());
            true
        });
        names
    }

    /// Apply the global switch.
    ///
    /// A disabled plugin tells the agent with `DISABLE` and returns `false`.
    pub async fn setup(&self) -> Result<bool> {
        if !self.config.enabled {
            info!(plugin = %self.name, "plugin is disabled in the configuration");
            let mut api = ApiWriter::new();
            api.disable();
            self.writer.lock().await.send(&mut api).await?;
            return Ok(false);
        }

        info!(
            plugin = %self.name,
            max_procs = self.config.max_procs,
            modules = self.modules.len(),
            "plugin enabled"
        );
        Ok(true)
    }

    /// Build one job per configured instance of every enabled module.
    ///
    /// Invalid job configurations are logged and skipped.
    pub fn build_jobs(&self) -> Vec<Job> {
        if let Some(filter) = &self.module_filter {
            if self.modules.get(filter).is_none() {
                warn!(module = %filter, "requested module is not registered");
            }
        }

        let mut jobs = Vec::new();

        for (module, creator) in self.modules.iter() {
            if self.module_filter.as_deref().is_some_and(|filter| filter != module) {
                continue;
            }

            if !self.config.is_module_enabled(module, creator.defaults.disabled_by_default) {
                debug!(module, "module is disabled");
                continue;
            }

            let module_config = self.module_configs.get(module).cloned().unwrap_or_default();

            for entry in module_config.job_configs(module, &creator.defaults) {
                let (mut config, raw) = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(module, "skipping job: {}", e);
                        continue;
                    }
                };

                config.update_every = config.update_every.max(self.min_update_every);

                match creator.create(&raw) {
                    Ok(collector) => jobs.push(Job::new(config, collector)),
                    Err(e) => warn!(module, job = %config.job_name(), "skipping job: {}", e),
                }
            }
        }

        jobs
    }

    /// Prepare every job concurrently and sort them into the registries.
    pub async fn check_jobs(&self) {
        let mut tasks = JoinSet::new();

        for mut job in self.build_jobs() {
            tasks.spawn(async move {
                let outcome = prepare(&mut job).await;
                (job, outcome)
            });
        }

        while let Some(result) = tasks.join_next().await {
            let (job, outcome) = match result {
                Ok(prepared) => prepared,
                Err(e) => {
                    error!("job preparation task failed: {}", e);
                    continue;
                }
            };

            match outcome {
                Preparation::Ready => {
                    if start_job(job, &self.running, &self.writer, &self.fatal) {
                        debug!("job started");
                    }
                }
                Preparation::CheckFailed if job.autodetection_retry() > 0 => {
                    self.queue_recheck(job);
                }
                Preparation::CheckFailed | Preparation::Failed => {
                    info!(parent: job.span(), "check failed, job disabled");
                }
            }
        }
    }

    fn queue_recheck(&self, job: Job) {
        let name = job.full_name().to_string();
        let retry = job.autodetection_retry();

        if self.running.exists(&name) {
            warn!(job = %name, "a job with the same name is already running, dropping it");
            return;
        }

        let pending = PendingJob {
            retry,
            job: Arc::new(tokio::sync::Mutex::new(Some(job))),
        };

        if self.recheck.put_if_not_exist(&name, pending) {
            info!(job = %name, retry, "check failed, will retry auto-detection");
        } else {
            warn!(job = %name, "a job with the same name is already waiting for auto-detection, dropping it");
        }
    }

    /// Drive the ticker until shutdown.
    ///
    /// Returns an error when a job failed to write to the output stream.
    pub async fn main_loop(&self) -> Result<()> {
        let mut ticker = Ticker::new(self.tick_interval);

        let result = loop {
            tokio::select! {
                biased;
                _ = self.fatal.cancelled() => {
                    break Err(NetdataPluginError::Runtime {
                        message: String::from("failed to write to the output stream"),
                    });
                }
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested, stopping main loop");
                    break Ok(());
                }
                clock = ticker.tick() => match clock {
                    Some(clock) => self.on_tick(clock),
                    None => break Ok(()),
                },
            }
        };

        ticker.stop();
        self.stop_jobs().await;
        result
    }

    fn on_tick(&self, clock: u64) {
        self.running.range(|_, job| {
            job.tick(clock);
            true
        });

        if clock == 0 {
            return;
        }

        self.recheck.range(|name, pending| {
            if clock % pending.retry == 0 {
                self.spawn_recheck(name, pending);
            }
            true
        });
    }

    fn spawn_recheck(&self, name: &str, pending: &PendingJob) {
        // Previous re-check of this job still in flight
        let Ok(mut slot) = Arc::clone(&pending.job).try_lock_owned() else {
            return;
        };

        let name = name.to_string();
        let running = Arc::clone(&self.running);
        let recheck = Arc::clone(&self.recheck);
        let writer = Arc::clone(&self.writer);
        let fatal = self.fatal.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let Some(job) = slot.as_mut() else {
                return;
            };

            if !job.check().await {
                debug!(parent: job.span(), "auto-detection check failed");
                return;
            }

            let promoted = job.post_check().await;
            recheck.delete(&name);

            let Some(job) = slot.take() else {
                return;
            };

            if !promoted {
                info!(parent: job.span(), "post check failed, job disabled");
                return;
            }

            if shutdown.is_cancelled() {
                return;
            }

            if start_job(job, &running, &writer, &fatal) {
                info!(job = %name, "auto-detection succeeded, job started");
            }
        });
    }

    /// Stop every job and wait (bounded) for their retractions.
    async fn stop_jobs(&self) {
        self.recheck.drain();

        let jobs = self.running.drain();
        if jobs.is_empty() {
            return;
        }

        for (_, job) in &jobs {
            job.shutdown();
        }

        let wait = async {
            for (_, job) in &jobs {
                job.join().await;
            }
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, wait).await {
            Ok(()) => info!("clean shutdown - all {} jobs stopped", jobs.len()),
            Err(_) => {
                let pending = jobs.iter().filter(|(_, job)| !job.is_finished()).count();
                warn!("shutdown timeout - {} of {} jobs still running", pending, jobs.len());
            }
        }
    }

    /// Signal the main loop to exit.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run the plugin until shutdown is requested or the output fails.
    pub async fn run(self) -> Result<()> {
        if !self.setup().await? {
            return Ok(());
        }

        self.handle_shutdown_signals();
        self.check_jobs().await;

        info!(
            running = self.running.len(),
            rechecking = self.recheck.len(),
            "initial check finished"
        );

        self.main_loop().await
    }

    /// Setup signal handlers for graceful shutdown
    fn handle_shutdown_signals(&self) {
        let shutdown_token = self.shutdown.clone();

        tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => info!("received shutdown signal, initiating graceful shutdown"),
                Err(e) => error!(
                    "failed to wait for shutdown signal: {}, initiating shutdown",
                    e
                ),
            }
            shutdown_token.cancel();
        });
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM on Unix, SIGINT on other platforms).
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = sigterm.recv() => Ok(()),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
