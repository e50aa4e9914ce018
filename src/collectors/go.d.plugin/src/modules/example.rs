//! A collector producing deterministic counters.
//!
//! Useful to see the plugin running without any monitored service. Every
//! dimension counts up by its position each cycle; with `grow_after` set, one
//! more dimension is added to every chart once that many cycles have run.

use netdata_plugin_error::{NetdataPluginError, Result};
use rt::charts::{Chart, ChartType, Charts, Dimension, DimensionAlgorithm, Metrics, Variable};
use rt::{Collector, CollectorBase};
use serde::Deserialize;

const CYCLES_VAR: &str = "cycles";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Example {
    /// Number of charts
    charts: usize,
    /// Dimensions per chart
    dims: usize,
    /// Cycles before an extra dimension appears; zero never
    grow_after: u64,
    #[serde(skip)]
    base: CollectorBase,
    #[serde(skip)]
    cycles: u64,
}

impl Default for Example {
    fn default() -> Self {
        Self {
            charts: 1,
            dims: 4,
            grow_after: 0,
            base: CollectorBase::default(),
            cycles: 0,
        }
    }
}

fn chart_id(idx: usize) -> String {
    format!("random_{idx}")
}

fn dim_id(chart: &str, name: &str) -> String {
    format!("{chart}_{name}")
}

impl Example {
    fn chart(&self, idx: usize) -> Chart {
        let id = chart_id(idx);
        let mut chart = Chart::new(&id)
            .with_title(format!("Example counters {idx}"))
            .with_units("events/s")
            .with_family("random")
            .with_context("example.random")
            .with_type(ChartType::Line)
            .with_var(Variable::new(CYCLES_VAR, 0));

        for d in 0..self.dims {
            let name = format!("dim_{d}");
            chart = chart.with_dim(
                Dimension::new(dim_id(&id, &name))
                    .with_name(name)
                    .with_algorithm(DimensionAlgorithm::Incremental),
            );
        }
        chart
    }

    fn grow(&self, charts: &mut Charts) {
        for chart in charts.iter_mut() {
            let id = dim_id(&chart.id, "extra");
            if let Err(e) = chart.add_dim(
                Dimension::new(id)
                    .with_name("extra")
                    .with_algorithm(DimensionAlgorithm::Incremental),
            ) {
                tracing::debug!(parent: self.logger(), "{}", e);
            }
        }
    }
}

impl Collector for Example {
    fn base(&self) -> &CollectorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CollectorBase {
        &mut self.base
    }

    fn init(&mut self) -> Result<()> {
        if self.charts == 0 || self.dims == 0 {
            return Err(NetdataPluginError::config(
                "'charts' and 'dims' must both be at least 1",
            ));
        }
        Ok(())
    }

    fn check(&mut self) -> bool {
        true
    }

    fn charts(&mut self) -> Option<Charts> {
        let mut charts = Charts::new();
        for idx in 0..self.charts {
            if let Err(e) = charts.add(self.chart(idx)) {
                tracing::warn!(parent: self.logger(), "{}", e);
                return None;
            }
        }
        Some(charts)
    }

    fn collect(&mut self, charts: &mut Charts) -> Option<Metrics> {
        self.cycles += 1;

        if self.grow_after > 0 && self.cycles == self.grow_after {
            self.grow(charts);
        }

        let cycles = self.cycles as i64;
        let mut metrics = Metrics::new();

        for chart in charts.iter() {
            for (pos, dim) in chart.dims().iter().enumerate() {
                metrics.insert(dim.id.clone(), cycles * (pos as i64 + 1));
            }
        }
        metrics.insert(CYCLES_VAR.to_string(), cycles);

        Some(metrics)
    }
}
