use std::collections::HashMap;

use netdata_plugin_error::{NetdataPluginError, Result};
use netdata_plugin_protocol::ApiWriter;

use super::chart::{Chart, ChartContext, Metrics};

/// First priority handed out to charts that do not set one.
pub const PRIORITY_START: i64 = 70000;

/// The ordered chart collection owned by one job.
///
/// Charts without an explicit priority get one from a monotonically
/// increasing counter. The assignment is remembered per chart ID, so a chart
/// that is removed and added again keeps its position.
#[derive(Debug, Clone)]
pub struct Charts {
    charts: Vec<Chart>,
    priorities: HashMap<String, i64>,
    next_priority: i64,
}

impl Default for Charts {
    fn default() -> Self {
        Self::new()
    }
}

impl Charts {
    pub fn new() -> Self {
        Self {
            charts: Vec::new(),
            priorities: HashMap::new(),
            next_priority: PRIORITY_START,
        }
    }

    /// Add a chart. Chart IDs are unique within the set.
    pub fn add(&mut self, mut chart: Chart) -> Result<()> {
        if self.contains(&chart.id) {
            return Err(NetdataPluginError::chart(format!(
                "duplicate chart '{}'",
                chart.id
            )));
        }

        if chart.priority == 0 {
            chart.priority = self.priority_for(&chart.id);
        }

        self.charts.push(chart);
        Ok(())
    }

    /// Builder form of [`Charts::add`] for static chart templates.
    pub fn with(mut self, chart: Chart) -> Result<Self> {
        self.add(chart)?;
        Ok(self)
    }

    fn priority_for(&mut self, id: &str) -> i64 {
        let next = &mut self.next_priority;
        *self.priorities.entry(id.to_string()).or_insert_with(|| {
            let priority = *next;
            *next += 1;
            priority
        })
    }

    pub fn remove(&mut self, id: &str) -> Option<Chart> {
        let idx = self.charts.iter().position(|c| c.id == id)?;
        Some(self.charts.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&Chart> {
        self.charts.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Chart> {
        self.charts.iter_mut().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.charts.iter().any(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chart> {
        self.charts.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chart> {
        self.charts.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Present one batch to every chart. Returns how many data blocks were written.
    pub fn update(&mut self, metrics: &Metrics, ctx: &ChartContext<'_>, api: &mut ApiWriter) -> usize {
        self.charts
            .iter_mut()
            .map(|chart| chart.update(metrics, ctx, api))
            .filter(|written| *written)
            .count()
    }

    /// Count a collection that returned no batch at all against every chart.
    pub fn record_failed_cycle(&mut self) {
        for chart in self.charts.iter_mut() {
            chart.record_failure();
        }
    }

    /// Retract announced charts that went `chart_cleanup` cycles without data.
    ///
    /// A zero threshold disables cleanup.
    pub fn obsolete_stale(&mut self, chart_cleanup: u64, ctx: &ChartContext<'_>, api: &mut ApiWriter) -> usize {
        if chart_cleanup == 0 {
            return 0;
        }

        self.charts
            .iter_mut()
            .filter(|chart| chart.is_created() && chart.failed_updates() >= chart_cleanup)
            .map(|chart| chart.obsolete(ctx, api))
            .filter(|written| *written)
            .count()
    }

    /// Retract every announced chart.
    pub fn obsolete_all(&mut self, ctx: &ChartContext<'_>, api: &mut ApiWriter) -> usize {
        self.charts
            .iter_mut()
            .map(|chart| chart.obsolete(ctx, api))
            .filter(|written| *written)
            .count()
    }
}
