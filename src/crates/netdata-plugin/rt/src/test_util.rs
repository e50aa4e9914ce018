//! Collectors and an output capture shared by the unit tests.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use netdata_plugin_error::{NetdataPluginError, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::io::AsyncWrite;

use crate::charts::{Chart, Charts, Dimension, Metrics};
use crate::collector::{Collector, CollectorBase};

/// In-memory protocol output.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    broken: bool,
}

impl Capture {
    /// A writer whose every write fails.
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

impl AsyncWrite for Capture {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if self.broken {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "output closed")));
        }
        self.buf.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Reports one constant value on a single chart.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StaticCollector {
    value: i64,
    #[serde(skip)]
    base: CollectorBase,
    #[serde(skip)]
    rename: Option<String>,
    #[serde(skip)]
    every: Option<u64>,
    #[serde(skip)]
    no_charts: bool,
    #[serde(skip)]
    fail_init: bool,
}

impl Default for StaticCollector {
    fn default() -> Self {
        Self::new(1)
    }
}

impl StaticCollector {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            base: CollectorBase::default(),
            rename: None,
            every: None,
            no_charts: false,
            fail_init: false,
        }
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::new(0)
        }
    }

    /// Report a different module name once checked.
    pub fn renamed(mut self, name: &str) -> Self {
        self.rename = Some(name.to_string());
        self
    }

    /// Report a different update interval once checked.
    pub fn every(mut self, update_every: u64) -> Self {
        self.every = Some(update_every);
        self
    }

    pub fn without_charts(mut self) -> Self {
        self.no_charts = true;
        self
    }
}

impl Collector for StaticCollector {
    fn base(&self) -> &CollectorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CollectorBase {
        &mut self.base
    }

    fn init(&mut self) -> Result<()> {
        if self.fail_init {
            return Err(NetdataPluginError::collector("init refused"));
        }
        Ok(())
    }

    fn check(&mut self) -> bool {
        if let Some(name) = self.rename.clone() {
            self.set_module_name(&name);
        }
        if let Some(update_every) = self.every {
            self.set_update_every(update_every);
        }
        true
    }

    fn charts(&mut self) -> Option<Charts> {
        if self.no_charts {
            return None;
        }
        Charts::new()
            .with(Chart::new("static").with_dim(Dimension::new("value")))
            .ok()
    }

    fn collect(&mut self, _charts: &mut Charts) -> Option<Metrics> {
        Some([(String::from("value"), self.value)].into_iter().collect())
    }
}

/// Panics in every collector call after `init`.
#[derive(Debug, Default)]
pub struct PanicCollector {
    base: CollectorBase,
}

impl Collector for PanicCollector {
    fn base(&self) -> &CollectorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CollectorBase {
        &mut self.base
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn check(&mut self) -> bool {
        panic!("check exploded");
    }

    fn charts(&mut self) -> Option<Charts> {
        panic!("charts exploded");
    }

    fn collect(&mut self, _charts: &mut Charts) -> Option<Metrics> {
        panic!("collect exploded");
    }
}

/// Takes `delay` to answer `check`.
#[derive(Debug)]
pub struct SlowCheckCollector {
    base: CollectorBase,
    delay: Duration,
    checks: Arc<AtomicUsize>,
}

impl SlowCheckCollector {
    pub fn new(delay: Duration) -> Self {
        Self {
            base: CollectorBase::default(),
            delay,
            checks: Arc::default(),
        }
    }

    /// Number of `check` calls that started.
    pub fn checks(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.checks)
    }
}

impl Collector for SlowCheckCollector {
    fn base(&self) -> &CollectorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CollectorBase {
        &mut self.base
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn check(&mut self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        true
    }

    fn charts(&mut self) -> Option<Charts> {
        Some(Charts::new())
    }

    fn collect(&mut self, _charts: &mut Charts) -> Option<Metrics> {
        None
    }
}

/// Never passes `check`; counts how often it was asked.
#[derive(Debug, Default)]
pub struct RefusingCollector {
    base: CollectorBase,
    checks: Arc<AtomicUsize>,
}

impl RefusingCollector {
    /// Count checks into `checks`, shared with the test.
    pub fn counting(checks: Arc<AtomicUsize>) -> Self {
        Self {
            base: CollectorBase::default(),
            checks,
        }
    }
}

impl Collector for RefusingCollector {
    fn base(&self) -> &CollectorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CollectorBase {
        &mut self.base
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn check(&mut self) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        false
    }

    fn charts(&mut self) -> Option<Charts> {
        Some(Charts::new())
    }

    fn collect(&mut self, _charts: &mut Charts) -> Option<Metrics> {
        None
    }
}

/// Counts `collect` calls, optionally slow, empty or panicking on chosen calls.
#[derive(Debug, Default)]
pub struct ScriptedCollector {
    base: CollectorBase,
    calls: Arc<AtomicUsize>,
    delay: Duration,
    panic_on: Vec<usize>,
    none_on: Vec<usize>,
}

impl ScriptedCollector {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Panic on the given 1-based call numbers.
    pub fn panic_on(mut self, calls: &[usize]) -> Self {
        self.panic_on = calls.to_vec();
        self
    }

    /// Return no batch on the given 1-based call numbers.
    pub fn none_on(mut self, calls: &[usize]) -> Self {
        self.none_on = calls.to_vec();
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Collector for ScriptedCollector {
    fn base(&self) -> &CollectorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CollectorBase {
        &mut self.base
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn check(&mut self) -> bool {
        true
    }

    fn charts(&mut self) -> Option<Charts> {
        Charts::new()
            .with(Chart::new("scripted").with_dim(Dimension::new("value")))
            .ok()
    }

    fn collect(&mut self, _charts: &mut Charts) -> Option<Metrics> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.panic_on.contains(&call) {
            panic!("collect call {call} exploded");
        }
        if self.none_on.contains(&call) {
            return None;
        }
        Some([(String::from("value"), call as i64)].into_iter().collect())
    }
}
