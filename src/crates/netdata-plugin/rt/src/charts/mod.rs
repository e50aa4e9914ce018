//! Chart presentation state for collection jobs.
//!
//! Collectors describe what they produce with [`Chart`], [`Dimension`] and
//! [`Variable`] values grouped in a [`Charts`] set. The set tracks what the
//! consumer has been told and turns each batch of collected [`Metrics`] into
//! protocol statements: announcements, data blocks and retractions.

mod chart;
mod metadata;
mod set;

pub use chart::{Chart, ChartContext, Dimension, MAX_DIMENSION_RETRIES, Metrics, Variable};
pub use metadata::{ChartOptions, ChartType, DimensionAlgorithm};
pub use set::{Charts, PRIORITY_START};
