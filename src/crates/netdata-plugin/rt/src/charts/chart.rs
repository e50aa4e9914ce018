//! Per-chart presentation state.
//!
//! A `Chart` decides, for every batch of collected values, whether the
//! consumer must first be told about the chart (CHART/DIMENSION block),
//! whether a data block is written, or whether nothing is written at all.

use std::collections::HashMap;
use std::time::Duration;

use netdata_plugin_error::{NetdataPluginError, Result};
use netdata_plugin_protocol::{ApiWriter, ChartDefinition, DimensionDefinition};

use super::metadata::{ChartOptions, ChartType, DimensionAlgorithm};

/// A batch of collected values keyed by dimension/variable id.
pub type Metrics = HashMap<String, i64>;

/// Consecutive misses after which a dimension is hidden.
pub const MAX_DIMENSION_RETRIES: u32 = 5;

/// One time series within a chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    /// Dimension ID (used in SET commands)
    pub id: String,
    /// Display name (shown in UI)
    pub name: String,
    pub algorithm: DimensionAlgorithm,
    pub multiplier: i64,
    pub divisor: i64,
    /// Hidden by the collector, independently of missing values
    pub hidden: bool,
    retries: u32,
}

impl Dimension {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            algorithm: DimensionAlgorithm::default(),
            multiplier: 1,
            divisor: 1,
            hidden: false,
            retries: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_algorithm(mut self, algorithm: DimensionAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_multiplier(mut self, multiplier: i64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_divisor(mut self, divisor: i64) -> Self {
        self.divisor = divisor;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Consecutive cycles this dimension had no value.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn is_alive(&self, max_retries: u32) -> bool {
        self.retries < max_retries
    }

    fn definition(&self, max_retries: u32) -> DimensionDefinition<'_> {
        DimensionDefinition {
            id: &self.id,
            name: &self.name,
            algorithm: self.algorithm.as_str(),
            multiplier: self.multiplier,
            divisor: self.divisor,
            hidden: self.hidden || !self.is_alive(max_retries),
        }
    }
}

/// A chart-scoped variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub id: String,
    pub value: i64,
}

impl Variable {
    pub fn new(id: impl Into<String>, value: i64) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

/// Announcement state of a chart as seen by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Presence {
    /// Never announced, or refreshed after an obsoletion.
    Pending,
    /// CHART block sent and not retracted since.
    Announced,
    /// Retraction recorded; no data until refreshed.
    Obsoleted,
}

/// Per-job values every emitted statement depends on.
#[derive(Debug, Clone, Copy)]
pub struct ChartContext<'a> {
    /// Chart type prefix, the owning job's full name
    pub type_id: &'a str,
    /// Module name written at the end of CHART statements
    pub module: &'a str,
    pub update_every: u64,
    pub max_retries: u32,
    /// Time since the job's previous successful cycle
    pub since_last: Option<Duration>,
}

/// What a dimension contributes to the current data block.
#[derive(Debug, Clone, Copy)]
enum Row {
    Value(i64),
    Empty,
    Skip,
}

/// A named, ordered group of dimensions and variables presented as one graph.
#[derive(Debug, Clone)]
pub struct Chart {
    pub id: String,
    pub override_id: String,
    pub title: String,
    pub units: String,
    pub family: String,
    pub context: String,
    pub chart_type: ChartType,
    /// Zero until the chart joins a [`Charts`](super::Charts) set
    pub priority: i64,
    pub options: ChartOptions,

    dims: Vec<Dimension>,
    vars: Vec<Variable>,

    presence: Presence,
    push: bool,
    updated: bool,
    failed_updates: u64,
}

impl Chart {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            context: id.clone(),
            id,
            override_id: String::new(),
            units: String::from("value"),
            family: String::new(),
            chart_type: ChartType::default(),
            priority: 0,
            options: ChartOptions::default(),
            dims: Vec::new(),
            vars: Vec::new(),
            presence: Presence::Pending,
            push: true,
            updated: false,
            failed_updates: 0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_type(mut self, chart_type: ChartType) -> Self {
        self.chart_type = chart_type;
        self
    }

    pub fn with_override_id(mut self, override_id: impl Into<String>) -> Self {
        self.override_id = override_id.into();
        self
    }

    pub fn with_options(mut self, options: ChartOptions) -> Self {
        self.options = options;
        self
    }

    /// Builder form of [`Chart::add_dim`]; duplicates are ignored.
    pub fn with_dim(mut self, dim: Dimension) -> Self {
        let _ = self.add_dim(dim);
        self
    }

    /// Builder form of [`Chart::add_var`]; duplicates are ignored.
    pub fn with_var(mut self, var: Variable) -> Self {
        let _ = self.add_var(var);
        self
    }

    /// Add a dimension and schedule a re-announcement.
    ///
    /// A dimension whose ID already exists is rejected and the chart is left
    /// untouched.
    pub fn add_dim(&mut self, dim: Dimension) -> Result<()> {
        if self.has_dim(&dim.id) {
            return Err(NetdataPluginError::chart(format!(
                "chart '{}' already has dimension '{}'",
                self.id, dim.id
            )));
        }
        self.dims.push(dim);
        self.push = true;
        Ok(())
    }

    /// Add a variable and schedule a re-announcement.
    pub fn add_var(&mut self, var: Variable) -> Result<()> {
        if self.has_var(&var.id) {
            return Err(NetdataPluginError::chart(format!(
                "chart '{}' already has variable '{}'",
                self.id, var.id
            )));
        }
        self.vars.push(var);
        self.push = true;
        Ok(())
    }

    pub fn has_dim(&self, id: &str) -> bool {
        self.dims.iter().any(|d| d.id == id)
    }

    pub fn has_var(&self, id: &str) -> bool {
        self.vars.iter().any(|v| v.id == id)
    }

    pub fn dim(&self, id: &str) -> Option<&Dimension> {
        self.dims.iter().find(|d| d.id == id)
    }

    /// Dimensions in display order
    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    /// Whether a CHART block has been sent since the last obsoletion.
    pub fn is_created(&self) -> bool {
        self.presence == Presence::Announced
    }

    pub fn is_obsoleted(&self) -> bool {
        self.presence == Presence::Obsoleted
    }

    /// Whether the next successful cycle starts with a CHART block.
    pub fn needs_push(&self) -> bool {
        self.push
    }

    /// Whether the previous data cycle produced a data block.
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// Consecutive cycles without a single dimension value.
    pub fn failed_updates(&self) -> u64 {
        self.failed_updates
    }

    /// Retract the chart.
    ///
    /// The retraction is written immediately, and only if the chart had been
    /// announced. Returns whether a statement was written.
    pub fn obsolete(&mut self, ctx: &ChartContext<'_>, api: &mut ApiWriter) -> bool {
        if self.presence == Presence::Obsoleted {
            return false;
        }

        let announced = self.presence == Presence::Announced;
        self.presence = Presence::Obsoleted;

        if announced {
            let options = self.options.to_string();
            api.obsolete(&self.definition(ctx, &options));
        }
        announced
    }

    /// Bring the chart back for announcement.
    ///
    /// This is the only way out of the obsoleted state.
    pub fn refresh(&mut self) {
        self.push = true;
        if self.presence == Presence::Obsoleted {
            self.presence = Presence::Pending;
            self.failed_updates = 0;
        }
    }

    /// Count a cycle in which the collector produced nothing.
    ///
    /// Dimensions are left alone: their retries only track values missing
    /// from batches that did arrive.
    pub fn record_failure(&mut self) {
        self.failed_updates += 1;
        self.updated = false;
    }

    /// Present one batch of collected values.
    ///
    /// Returns `true` when a data block was written.
    pub fn update(&mut self, metrics: &Metrics, ctx: &ChartContext<'_>, api: &mut ApiWriter) -> bool {
        let mut rows = Vec::with_capacity(self.dims.len());
        let mut any_value = false;

        for dim in self.dims.iter_mut() {
            match metrics.get(&dim.id) {
                Some(&value) => {
                    if !dim.is_alive(ctx.max_retries) {
                        self.push = true;
                    }
                    dim.retries = 0;
                    rows.push(Row::Value(value));
                    any_value = true;
                }
                None if dim.is_alive(ctx.max_retries) => {
                    dim.retries += 1;
                    if !dim.is_alive(ctx.max_retries) {
                        self.push = true;
                    }
                    rows.push(Row::Empty);
                }
                None => rows.push(Row::Skip),
            }
        }

        if !any_value {
            self.record_failure();
            return false;
        }

        if self.presence == Presence::Obsoleted {
            self.refresh();
        }

        if self.push {
            self.write_definition(ctx, api);
            self.presence = Presence::Announced;
            self.push = false;
        }

        let since_last = if self.updated { ctx.since_last } else { None };
        api.begin(ctx.type_id, &self.id, since_last);

        for (dim, row) in self.dims.iter().zip(&rows) {
            match row {
                Row::Value(value) => api.set(&dim.id, *value),
                Row::Empty => api.set_empty(&dim.id),
                Row::Skip => {}
            }
        }

        for var in self.vars.iter_mut() {
            if let Some(&value) = metrics.get(&var.id) {
                var.value = value;
                api.set(&var.id, value);
            }
        }

        api.end();

        self.updated = true;
        self.failed_updates = 0;
        true
    }

    fn write_definition(&self, ctx: &ChartContext<'_>, api: &mut ApiWriter) {
        let options = self.options.to_string();
        api.chart(&self.definition(ctx, &options));

        for dim in &self.dims {
            api.dimension(&dim.definition(ctx.max_retries));
        }

        for var in self.vars.iter().filter(|v| v.value != 0) {
            api.variable(&var.id, var.value);
        }
    }

    fn definition<'a>(&'a self, ctx: &ChartContext<'a>, options: &'a str) -> ChartDefinition<'a> {
        ChartDefinition {
            type_id: ctx.type_id,
            id: &self.id,
            override_id: &self.override_id,
            title: &self.title,
            units: &self.units,
            family: &self.family,
            context: &self.context,
            chart_type: self.chart_type.as_str(),
            priority: self.priority,
            update_every: ctx.update_every,
            options,
            module: ctx.module,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ChartContext<'static> {
        ChartContext {
            type_id: "go_test_job",
            module: "go_test",
            update_every: 1,
            max_retries: MAX_DIMENSION_RETRIES,
            since_last: Some(Duration::from_secs(1)),
        }
    }

    fn metrics(values: &[(&str, i64)]) -> Metrics {
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn lines(api: &mut ApiWriter) -> Vec<String> {
        let out = String::from_utf8_lossy(api.buffer()).into_owned();
        api.clear();
        out.lines().map(String::from).collect()
    }

    fn count(lines: &[String], prefix: &str) -> usize {
        lines.iter().filter(|l| l.starts_with(prefix)).count()
    }

    fn two_dim_chart() -> Chart {
        let mut chart = Chart::new("requests")
            .with_dim(Dimension::new("ok"))
            .with_dim(Dimension::new("failed"));
        chart.priority = 70000;
        chart
    }

    mod push_discipline {
        use super::*;

        #[test]
        fn first_update_announces_chart() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();

            assert!(chart.needs_push());
            assert!(chart.update(&metrics(&[("ok", 1), ("failed", 2)]), &ctx(), &mut api));

            let out = lines(&mut api);
            assert_eq!(
                out,
                vec![
                    "CHART go_test_job.requests '' 'requests' 'value' '' 'requests' line 70000 1 '' go_test",
                    "DIMENSION 'ok' 'ok' 'absolute' 1 1",
                    "DIMENSION 'failed' 'failed' 'absolute' 1 1",
                    "BEGIN go_test_job.requests",
                    "SET 'ok' = 1",
                    "SET 'failed' = 2",
                    "END",
                ]
            );
            assert!(chart.is_created());
            assert!(!chart.needs_push());
        }

        #[test]
        fn second_update_sends_data_only() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            let batch = metrics(&[("ok", 1), ("failed", 2)]);

            chart.update(&batch, &ctx(), &mut api);
            lines(&mut api);
            chart.update(&batch, &ctx(), &mut api);

            let out = lines(&mut api);
            assert_eq!(count(&out, "CHART"), 0);
            assert_eq!(out[0], "BEGIN go_test_job.requests 1000000");
        }

        #[test]
        fn add_dim_reannounces_once() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();

            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            lines(&mut api);

            chart.add_dim(Dimension::new("retried")).unwrap();
            assert!(chart.needs_push());

            let batch = metrics(&[("ok", 1), ("retried", 3)]);
            chart.update(&batch, &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(count(&out, "CHART"), 1);
            assert_eq!(count(&out, "DIMENSION"), 3);
            assert!(!chart.needs_push());

            chart.update(&batch, &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(count(&out, "CHART"), 0);
        }

        #[test]
        fn add_var_reannounces() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();

            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            lines(&mut api);

            chart.add_var(Variable::new("limit", 100)).unwrap();
            assert!(chart.needs_push());

            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(count(&out, "CHART"), 1);
            assert!(out.contains(&"VARIABLE CHART 'limit' = '100'".to_string()));
        }

        #[test]
        fn duplicate_additions_are_rejected() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);

            assert!(chart.add_dim(Dimension::new("ok")).is_err());
            assert!(!chart.needs_push());
            assert_eq!(chart.dims().len(), 2);

            chart.add_var(Variable::new("v", 1)).unwrap();
            assert!(chart.add_var(Variable::new("v", 2)).is_err());
            assert_eq!(chart.vars().len(), 1);
        }

        #[test]
        fn zero_variables_are_not_announced() {
            let mut chart = two_dim_chart()
                .with_var(Variable::new("zero", 0))
                .with_var(Variable::new("seven", 7));
            let mut api = ApiWriter::new();

            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(count(&out, "VARIABLE"), 1);
            assert!(out.contains(&"VARIABLE CHART 'seven' = '7'".to_string()));
        }

        #[test]
        fn variables_present_in_batch_are_set() {
            let mut chart = two_dim_chart().with_var(Variable::new("limit", 0));
            let mut api = ApiWriter::new();

            chart.update(&metrics(&[("ok", 1), ("limit", 50)]), &ctx(), &mut api);
            let out = lines(&mut api);

            let end = out.iter().position(|l| l == "END").unwrap();
            assert_eq!(out[end - 1], "SET 'limit' = 50");
            assert_eq!(chart.vars()[0].value, 50);
        }
    }

    mod dimension_retries {
        use super::*;

        #[test]
        fn missing_dimension_gets_empty_set() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();

            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            let out = lines(&mut api);
            assert!(out.contains(&"SET 'failed' = ".to_string()));
            assert_eq!(chart.dim("failed").unwrap().retries(), 1);
        }

        #[test]
        fn hidden_after_max_retries_then_unhidden() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            let partial = metrics(&[("ok", 1)]);

            chart.update(&metrics(&[("ok", 1), ("failed", 1)]), &ctx(), &mut api);
            lines(&mut api);

            let mut pushes = 0;
            for _ in 0..MAX_DIMENSION_RETRIES {
                chart.update(&partial, &ctx(), &mut api);
                let out = lines(&mut api);
                pushes += count(&out, "CHART");
            }
            assert_eq!(pushes, 1, "crossing the retry limit re-announces once");
            assert_eq!(chart.dim("failed").unwrap().retries(), MAX_DIMENSION_RETRIES);

            // Dead dimensions are no longer part of data blocks
            chart.update(&partial, &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(count(&out, "CHART"), 0);
            assert_eq!(count(&out, "SET 'failed'"), 0);

            // Reappearing un-hides with exactly one re-announcement
            chart.update(&metrics(&[("ok", 1), ("failed", 9)]), &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(count(&out, "CHART"), 1);
            assert!(out.contains(&"DIMENSION 'failed' 'failed' 'absolute' 1 1".to_string()));
            assert_eq!(chart.dim("failed").unwrap().retries(), 0);

            chart.update(&metrics(&[("ok", 1), ("failed", 9)]), &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(count(&out, "CHART"), 0);
        }

        #[test]
        fn hidden_attribute_precedes_data_block() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            let partial = metrics(&[("ok", 1)]);

            chart.update(&metrics(&[("ok", 1), ("failed", 1)]), &ctx(), &mut api);
            for _ in 0..MAX_DIMENSION_RETRIES - 1 {
                chart.update(&partial, &ctx(), &mut api);
            }
            lines(&mut api);

            chart.update(&partial, &ctx(), &mut api);
            let out = lines(&mut api);
            let hidden = out
                .iter()
                .position(|l| l == "DIMENSION 'failed' 'failed' 'absolute' 1 1 hidden")
                .unwrap();
            let begin = out.iter().position(|l| l.starts_with("BEGIN")).unwrap();
            assert!(hidden < begin);
        }

        #[test]
        fn steady_values_never_touch_state() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            let batch = metrics(&[("ok", 1), ("failed", 2)]);

            chart.update(&batch, &ctx(), &mut api);
            for _ in 0..20 {
                chart.update(&batch, &ctx(), &mut api);
                assert!(!chart.needs_push());
                assert!(chart.dims().iter().all(|d| d.retries() == 0));
            }
        }
    }

    mod failures {
        use super::*;

        #[test]
        fn empty_batch_writes_nothing() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();

            assert!(!chart.update(&Metrics::new(), &ctx(), &mut api));
            assert!(api.is_empty());
            assert_eq!(chart.failed_updates(), 1);
            assert!(!chart.is_updated());
            assert!(!chart.is_created());
        }

        #[test]
        fn success_resets_failed_updates() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();

            chart.update(&Metrics::new(), &ctx(), &mut api);
            chart.update(&Metrics::new(), &ctx(), &mut api);
            assert_eq!(chart.failed_updates(), 2);

            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            assert_eq!(chart.failed_updates(), 0);
            assert!(chart.is_updated());
        }

        #[test]
        fn begin_omits_interval_after_failed_cycle() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            let batch = metrics(&[("ok", 1)]);

            chart.update(&batch, &ctx(), &mut api);
            chart.update(&Metrics::new(), &ctx(), &mut api);
            lines(&mut api);

            chart.update(&batch, &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(out[0], "BEGIN go_test_job.requests");
        }

        #[test]
        fn recorded_failures_leave_dimensions_alone() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            let batch = metrics(&[("ok", 1), ("failed", 0)]);

            chart.update(&batch, &ctx(), &mut api);
            lines(&mut api);

            for _ in 0..MAX_DIMENSION_RETRIES + 1 {
                chart.record_failure();
            }
            assert_eq!(chart.failed_updates(), u64::from(MAX_DIMENSION_RETRIES) + 1);
            assert!(!chart.is_updated());
            assert!(!chart.needs_push());

            chart.update(&batch, &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(count(&out, "CHART "), 0);
            assert_eq!(out[0], "BEGIN go_test_job.requests");
            assert_eq!(chart.failed_updates(), 0);
        }
    }

    mod obsoletion {
        use super::*;

        #[test]
        fn obsolete_created_chart_emits_retraction() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            lines(&mut api);

            assert!(chart.obsolete(&ctx(), &mut api));
            let out = lines(&mut api);
            assert_eq!(
                out,
                vec!["CHART go_test_job.requests '' 'requests' 'value' '' 'requests' line 70000 1 obsolete go_test"]
            );
            assert!(chart.is_obsoleted());
            assert!(!chart.is_created());

            // Already obsoleted
            assert!(!chart.obsolete(&ctx(), &mut api));
            assert!(api.is_empty());
        }

        #[test]
        fn obsolete_unannounced_chart_is_silent() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();

            assert!(!chart.obsolete(&ctx(), &mut api));
            assert!(api.is_empty());
            assert!(chart.is_obsoleted());
        }

        #[test]
        fn refresh_round_trip() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            chart.update(&Metrics::new(), &ctx(), &mut api);
            chart.obsolete(&ctx(), &mut api);
            lines(&mut api);
            assert_eq!(chart.failed_updates(), 1);

            chart.refresh();
            assert!(!chart.is_obsoleted());
            assert_eq!(chart.failed_updates(), 0);
            assert!(chart.needs_push());

            chart.update(&metrics(&[("ok", 2)]), &ctx(), &mut api);
            let out = lines(&mut api);
            assert_eq!(count(&out, "CHART"), 1);
            assert!(chart.is_created());
        }

        #[test]
        fn fresh_data_refreshes_obsoleted_chart() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            chart.obsolete(&ctx(), &mut api);
            lines(&mut api);

            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            let out = lines(&mut api);
            assert!(out[0].starts_with("CHART go_test_job.requests"));
            assert!(!out[0].contains("obsolete"));
            assert!(chart.is_created());
        }

        #[test]
        fn obsoleted_chart_without_data_stays_silent() {
            let mut chart = two_dim_chart();
            let mut api = ApiWriter::new();
            chart.update(&metrics(&[("ok", 1)]), &ctx(), &mut api);
            chart.obsolete(&ctx(), &mut api);
            lines(&mut api);

            chart.update(&Metrics::new(), &ctx(), &mut api);
            assert!(api.is_empty());
            assert!(chart.is_obsoleted());
        }
    }
}
