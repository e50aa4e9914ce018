//! The contract every data collector implements.

use netdata_plugin_error::Result;
use tracing::Span;

use crate::charts::{Charts, Metrics};

/// Identity and logging state the runtime binds into every collector.
///
/// Collectors embed one of these and expose it through
/// [`Collector::base`]/[`Collector::base_mut`]; the default accessor methods
/// of the trait operate on it.
#[derive(Debug, Clone)]
pub struct CollectorBase {
    pub module_name: String,
    pub update_every: u64,
    pub logger: Span,
}

impl Default for CollectorBase {
    fn default() -> Self {
        Self {
            module_name: String::new(),
            update_every: 1,
            logger: Span::none(),
        }
    }
}

/// A data collector driven by a [`Job`](crate::Job).
///
/// Every method except the accessors runs on a blocking worker thread, so
/// implementations are free to perform synchronous I/O. A panic inside
/// `check` or `collect` is contained by the job and counts as a failure.
pub trait Collector: Send + 'static {
    fn base(&self) -> &CollectorBase;

    fn base_mut(&mut self) -> &mut CollectorBase;

    /// Collector specific initialization. An error disables the job.
    fn init(&mut self) -> Result<()>;

    /// Probe the target. `false` leaves the job for auto-detection retry.
    fn check(&mut self) -> bool;

    /// The chart set the job starts with. `None` disables the job.
    fn charts(&mut self) -> Option<Charts>;

    /// Collect one batch of values.
    ///
    /// `charts` is the job's live chart set; dimensions and variables
    /// discovered during the cycle can be added to it directly. `None` marks
    /// the cycle as failed.
    fn collect(&mut self, charts: &mut Charts) -> Option<Metrics>;

    fn module_name(&self) -> &str {
        &self.base().module_name
    }

    fn set_module_name(&mut self, name: &str) {
        self.base_mut().module_name = name.to_string();
    }

    fn update_every(&self) -> u64 {
        self.base().update_every
    }

    fn set_update_every(&mut self, update_every: u64) {
        self.base_mut().update_every = update_every;
    }

    fn logger(&self) -> &Span {
        &self.base().logger
    }

    fn set_logger(&mut self, logger: Span) {
        self.base_mut().logger = logger;
    }
}
