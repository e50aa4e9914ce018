//! One scheduled collector instance and its private collection task.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use netdata_plugin_error::{NetdataPluginError, Result};
use netdata_plugin_protocol::{ApiWriter, MessageWriter};
use parking_lot::Mutex;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::charts::{ChartContext, Charts, MAX_DIMENSION_RETRIES, Metrics};
use crate::collector::Collector;
use crate::config::{JobConfig, MODULE_NAME_PREFIX};

/// Hard budget for a collector's `check`.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// The protocol output stream shared by every job of a plugin.
pub type SharedWriter = Arc<tokio::sync::Mutex<MessageWriter<Box<dyn AsyncWrite + Unpin + Send>>>>;

/// Wrap any writer as a [`SharedWriter`].
pub fn shared_writer<W>(writer: W) -> SharedWriter
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer: Box<dyn AsyncWrite + Unpin + Send> = Box::new(writer);
    Arc::new(tokio::sync::Mutex::new(MessageWriter::new(writer)))
}

/// The collector together with the charts it feeds.
struct Unit {
    collector: Box<dyn Collector>,
    charts: Charts,
}

fn job_span(module: &str, job: &str) -> Span {
    info_span!("job", module = %module, job = %job)
}

/// Log a failed blocking task, with the panic payload when there is one.
fn log_task_failure(span: &Span, what: &str, err: JoinError) {
    if err.is_panic() {
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| String::from("non-string panic payload"));
        error!(parent: span, panic = %message, "collector panicked during {}", what);
    } else {
        error!(parent: span, error = %err, "{} task did not complete", what);
    }
}

/// A collector instance, its configuration and its chart set.
///
/// A `Job` goes through `init`, `check` and `post_check` while owned by the
/// orchestrator, and is then split into a [`RunningJob`] handle and the
/// [`JobTask`] that owns the collection cycle.
pub struct Job {
    config: JobConfig,
    full_name: String,
    module_name: String,
    update_every: u64,
    span: Span,
    unit: Arc<Mutex<Unit>>,
    check_timeout: Duration,
    /// Set while a `check` runs on its blocking thread, even after the
    /// caller gave up waiting for it.
    checking: Arc<AtomicBool>,
}

/// Clears the in-flight flag when the blocking check returns or unwinds.
struct CheckInFlight(Arc<AtomicBool>);

impl Drop for CheckInFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("full_name", &self.full_name)
            .field("module_name", &self.module_name)
            .field("update_every", &self.update_every)
            .finish_non_exhaustive()
    }
}

impl Job {
    pub fn new(config: JobConfig, collector: Box<dyn Collector>) -> Self {
        let span = job_span(&config.real_module_name, config.job_name());
        Self {
            full_name: config.full_name(),
            module_name: config.real_module_name.clone(),
            update_every: config.update_every.max(1),
            config,
            span,
            unit: Arc::new(Mutex::new(Unit {
                collector,
                charts: Charts::new(),
            })),
            check_timeout: CHECK_TIMEOUT,
            checking: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the check budget.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Module name as reported by the collector after `post_check`.
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    pub fn update_every(&self) -> u64 {
        self.update_every
    }

    pub fn autodetection_retry(&self) -> u64 {
        self.config.autodetection_retry
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Bind identity and logger into the collector, then run its own
    /// initialization. An error is terminal for this job.
    pub async fn init(&self) -> Result<()> {
        let unit = Arc::clone(&self.unit);
        let span = self.span.clone();
        let module_name = self.module_name.clone();
        let update_every = self.update_every;

        let result = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut unit = unit.lock();
            unit.collector.set_module_name(&module_name);
            unit.collector.set_update_every(update_every);
            unit.collector.set_logger(span.clone());
            unit.collector.init()
        })
        .await;

        match result {
            Ok(result) => result,
            Err(err) => {
                log_task_failure(&self.span, "init", err);
                Err(NetdataPluginError::collector("init panicked"))
            }
        }
    }

    /// Probe the target within the check budget.
    ///
    /// Panics and timeouts count as a failed check. A timed out check is
    /// abandoned: its result, if it ever arrives, is discarded. While an
    /// abandoned check is still running, further checks fail immediately
    /// instead of queueing another blocking thread behind it.
    pub async fn check(&self) -> bool {
        if self
            .checking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(parent: &self.span, "previous check has not returned yet, skipping");
            return false;
        }

        let in_flight = CheckInFlight(Arc::clone(&self.checking));
        let unit = Arc::clone(&self.unit);
        let span = self.span.clone();

        let task = tokio::task::spawn_blocking(move || {
            let _in_flight = in_flight;
            let _entered = span.enter();
            unit.lock().collector.check()
        });

        match tokio::time::timeout(self.check_timeout, task).await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                debug!(parent: &self.span, "check failed");
                false
            }
            Ok(Err(err)) => {
                log_task_failure(&self.span, "check", err);
                false
            }
            Err(_) => {
                warn!(
                    parent: &self.span,
                    timeout = ?self.check_timeout,
                    "check did not finish in time"
                );
                false
            }
        }
    }

    /// Adopt the collector's authoritative module name and update interval,
    /// and load its chart set. A missing chart set fails the job.
    pub async fn post_check(&mut self) -> bool {
        let unit = Arc::clone(&self.unit);
        let span = self.span.clone();

        let result = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut unit = unit.lock();
            let module_name = unit.collector.module_name().to_string();
            let update_every = unit.collector.update_every();
            let loaded = match unit.collector.charts() {
                Some(charts) => {
                    unit.charts = charts;
                    true
                }
                None => false,
            };
            (module_name, update_every, loaded)
        })
        .await;

        let (module_name, update_every, loaded) = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                log_task_failure(&self.span, "post check", err);
                return false;
            }
        };

        if !module_name.is_empty() && module_name != self.module_name {
            debug!(parent: &self.span, from = %self.module_name, to = %module_name, "module renamed");
            self.module_name = module_name;
            self.span = job_span(&self.module_name, self.config.job_name());
            self.unit.lock().collector.set_logger(self.span.clone());
        }

        if update_every > 0 {
            self.update_every = update_every;
        }

        if !loaded {
            warn!(parent: &self.span, "collector returned no charts");
            return false;
        }

        true
    }

    /// Split the job into its control handle and its collection task.
    ///
    /// The task does nothing until [`JobTask::spawn`] is called, so a job
    /// that loses a registry race can simply be dropped.
    pub fn into_running(self, writer: SharedWriter, fatal: CancellationToken) -> (RunningJob, JobTask) {
        let (tick_tx, tick_rx) = mpsc::channel(1);
        let busy = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();

        let running = RunningJob {
            full_name: self.full_name.clone(),
            span: self.span.clone(),
            tick_tx,
            busy: Arc::clone(&busy),
            shutdown: shutdown.clone(),
            handle: Mutex::new(None),
        };

        let task = JobTask {
            wire_module: format!("{MODULE_NAME_PREFIX}{}", self.module_name),
            full_name: self.full_name,
            update_every: self.update_every,
            chart_cleanup: self.config.chart_cleanup,
            max_failures: self.config.max_retries,
            span: self.span,
            unit: self.unit,
            writer,
            fatal,
            shutdown,
            tick_rx,
            busy,
        };

        (running, task)
    }
}

/// Control handle of a job whose collection task is running.
#[derive(Debug)]
pub struct RunningJob {
    full_name: String,
    span: Span,
    tick_tx: mpsc::Sender<u64>,
    busy: Arc<AtomicBool>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RunningJob {
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Offer a clock value to the collection task without waiting.
    ///
    /// The tick is dropped when the previous cycle has not finished yet.
    /// Returns whether the tick was handed over.
    pub fn tick(&self, clock: u64) -> bool {
        if self.busy.load(Ordering::Acquire) {
            warn!(parent: &self.span, clock, "previous collection still running, skipping tick");
            return false;
        }

        match self.tick_tx.try_send(clock) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(parent: &self.span, clock, "previous tick not consumed yet, skipping tick");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Whether a collection cycle is in progress.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Ask the task to stop after its current cycle. Never blocks.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.lock().as_ref().map_or(true, |h| h.is_finished())
    }

    pub(crate) fn attach(&self, handle: JoinHandle<()>) {
        *self.handle.lock() = Some(handle);
    }

    /// Wait for the task to exit. Returns immediately if it never started or
    /// was already joined.
    pub async fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                log_task_failure(&self.span, "job task", err);
            }
        }
    }
}

/// The collection task of one job.
pub struct JobTask {
    full_name: String,
    wire_module: String,
    update_every: u64,
    chart_cleanup: u64,
    max_failures: u32,
    span: Span,
    unit: Arc<Mutex<Unit>>,
    writer: SharedWriter,
    fatal: CancellationToken,
    shutdown: CancellationToken,
    tick_rx: mpsc::Receiver<u64>,
    busy: Arc<AtomicBool>,
}

impl JobTask {
    pub fn spawn(self) -> JoinHandle<()> {
        let span = self.span.clone();
        tokio::spawn(self.run().instrument(span))
    }

    async fn run(mut self) {
        info!(update_every = self.update_every, "started");

        let mut api = ApiWriter::new();
        let mut last_success: Option<Instant> = None;
        let mut failures: u32 = 0;

        loop {
            let clock = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                clock = self.tick_rx.recv() => match clock {
                    Some(clock) => clock,
                    None => break,
                },
            };

            if clock % self.update_every != 0 {
                continue;
            }

            self.busy.store(true, Ordering::Release);
            let written = self.cycle(&mut api, &mut last_success, &mut failures).await;
            self.busy.store(false, Ordering::Release);

            if !written {
                return;
            }
        }

        self.retract(&mut api).await;
        info!("stopped");
    }

    /// Collect, present and write one batch. Returns `false` when the output
    /// stream failed.
    async fn cycle(&self, api: &mut ApiWriter, last_success: &mut Option<Instant>, failures: &mut u32) -> bool {
        let started = Instant::now();
        let unit = Arc::clone(&self.unit);
        let span = self.span.clone();

        let result = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut unit = unit.lock();
            let Unit { collector, charts } = &mut *unit;
            collector.collect(charts)
        })
        .await;

        let metrics = match result {
            Ok(Some(metrics)) => Some(metrics),
            Ok(None) => None,
            Err(err) => {
                log_task_failure(&self.span, "collect", err);
                None
            }
        };

        let since_last = last_success.map(|previous| started.saturating_duration_since(previous));
        match metrics {
            Some(_) => {
                *failures = 0;
                *last_success = Some(started);
            }
            None => {
                *failures += 1;
                if *failures == self.max_failures {
                    warn!(failures = *failures, "collection keeps failing");
                } else {
                    debug!(failures = *failures, "collection failed");
                }
            }
        }

        self.present(metrics.as_ref(), since_last, api);
        self.send(api).await
    }

    /// Hand a batch to the charts, or count the failed cycle when there is
    /// none, then retract charts that stayed silent too long.
    fn present(&self, metrics: Option<&Metrics>, since_last: Option<Duration>, api: &mut ApiWriter) {
        let ctx = ChartContext {
            type_id: &self.full_name,
            module: &self.wire_module,
            update_every: self.update_every,
            max_retries: MAX_DIMENSION_RETRIES,
            since_last,
        };

        let mut unit = self.unit.lock();
        match metrics {
            Some(metrics) => {
                unit.charts.update(metrics, &ctx, api);
            }
            None => unit.charts.record_failed_cycle(),
        }

        let retracted = unit.charts.obsolete_stale(self.chart_cleanup, &ctx, api);
        if retracted > 0 {
            info!(charts = retracted, "obsoleted charts without data");
        }
    }

    /// Write buffered statements. A failure cancels the whole plugin.
    async fn send(&self, api: &mut ApiWriter) -> bool {
        if api.is_empty() {
            return true;
        }

        let mut writer = self.writer.lock().await;
        match writer.send(api).await {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "failed to write to the output stream");
                api.clear();
                self.fatal.cancel();
                false
            }
        }
    }

    /// Retract every announced chart on the way out.
    async fn retract(&self, api: &mut ApiWriter) {
        if self.fatal.is_cancelled() {
            return;
        }

        let ctx = ChartContext {
            type_id: &self.full_name,
            module: &self.wire_module,
            update_every: self.update_every,
            max_retries: MAX_DIMENSION_RETRIES,
            since_last: None,
        };

        let retracted = self.unit.lock().charts.obsolete_all(&ctx, api);
        if retracted > 0 {
            debug!(charts = retracted, "obsoleted charts on shutdown");
            self.send(api).await;
        }
    }
}
