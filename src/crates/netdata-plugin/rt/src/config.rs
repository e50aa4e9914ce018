//! Plugin, module and job configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use netdata_plugin_error::{NetdataPluginError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::modules::ModuleDefaults;

/// Prefix of every module name on the wire.
pub const MODULE_NAME_PREFIX: &str = "go_";

fn from_yaml_str<T: DeserializeOwned + Default>(contents: &str) -> Result<T> {
    if contents.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(contents)
        .map_err(|e| NetdataPluginError::config(format!("invalid YAML: {e}")))
}

fn from_yaml_file<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)
        .map_err(|e| NetdataPluginError::config(format!("{}: {e}", path.display())))?;
    from_yaml_str(&contents)
        .map_err(|e| NetdataPluginError::config(format!("{}: {e}", path.display())))
}

/// Process wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub enabled: bool,
    pub default_run: bool,
    /// Worker threads; zero means one per CPU
    pub max_procs: usize,
    pub modules: BTreeMap<String, bool>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_run: true,
            max_procs: 0,
            modules: BTreeMap::new(),
        }
    }
}

impl PluginConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        from_yaml_str(contents)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        from_yaml_file(path)
    }

    /// An explicit entry wins; otherwise the module runs when `default_run`
    /// is set and the module is not disabled by default.
    pub fn is_module_enabled(&self, name: &str, disabled_by_default: bool) -> bool {
        match self.modules.get(name) {
            Some(&enabled) => enabled,
            None => self.default_run && !disabled_by_default,
        }
    }
}

/// Contents of one module configuration file.
///
/// Module level values are defaults for every job in `jobs`. Each job entry
/// is kept as raw YAML so the module's collector can read its own fields
/// from it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub update_every: Option<u64>,
    pub autodetection_retry: Option<u64>,
    pub chart_cleanup: Option<u64>,
    pub retries: Option<u32>,
    pub jobs: Vec<serde_yaml::Value>,
}

/// The scheduling fields a job entry may override.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobOverrides {
    name: Option<String>,
    update_every: Option<u64>,
    autodetection_retry: Option<u64>,
    chart_cleanup: Option<u64>,
    retries: Option<u32>,
}

impl ModuleConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        from_yaml_str(contents)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        from_yaml_file(path)
    }

    /// Module defaults with the file's module level values applied.
    fn merged_defaults(&self, defaults: &ModuleDefaults) -> ModuleDefaults {
        ModuleDefaults {
            update_every: self.update_every.filter(|&v| v > 0).unwrap_or(defaults.update_every),
            autodetection_retry: self.autodetection_retry.unwrap_or(defaults.autodetection_retry),
            chart_cleanup: self.chart_cleanup.unwrap_or(defaults.chart_cleanup),
            max_retries: self.retries.unwrap_or(defaults.max_retries),
            disabled_by_default: defaults.disabled_by_default,
        }
    }

    /// Build the job configurations of `module`.
    ///
    /// Each entry is paired with the raw job mapping it came from. A file
    /// without jobs yields a single job running on the module defaults.
    /// Invalid entries are returned as errors so the caller can skip them.
    pub fn job_configs(
        &self,
        module: &str,
        defaults: &ModuleDefaults,
    ) -> Vec<Result<(JobConfig, serde_yaml::Value)>> {
        let defaults = self.merged_defaults(defaults);

        if self.jobs.is_empty() {
            let config = JobConfig::from_defaults(module, &defaults);
            let raw = serde_yaml::Value::Mapping(Default::default());
            return vec![config.validate().map(|()| (config, raw))];
        }

        self.jobs
            .iter()
            .enumerate()
            .map(|(idx, raw)| {
                let overrides: JobOverrides = serde_yaml::from_value(raw.clone()).map_err(|e| {
                    NetdataPluginError::config(format!("module '{module}' job #{idx}: {e}"))
                })?;

                let mut config = JobConfig::from_defaults(module, &defaults);
                config.override_name = overrides.name.unwrap_or_default();
                if let Some(update_every) = overrides.update_every.filter(|&v| v > 0) {
                    config.update_every = update_every;
                }
                if let Some(retry) = overrides.autodetection_retry {
                    config.autodetection_retry = retry;
                }
                if let Some(cleanup) = overrides.chart_cleanup {
                    config.chart_cleanup = cleanup;
                }
                if let Some(retries) = overrides.retries {
                    config.max_retries = retries;
                }

                config.validate()?;
                Ok((config, raw.clone()))
            })
            .collect()
    }
}

/// Scheduling configuration and identity of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub real_module_name: String,
    pub real_job_name: String,
    pub override_name: String,
    pub update_every: u64,
    /// Seconds between re-checks of a job that failed its check; zero disables
    pub autodetection_retry: u64,
    /// Failed cycles after which a chart is retracted; zero disables
    pub chart_cleanup: u64,
    /// Consecutive failed collections that are reported; zero disables
    pub max_retries: u32,
}

impl JobConfig {
    pub fn new(module: &str) -> Self {
        Self::from_defaults(module, &ModuleDefaults::default())
    }

    pub fn from_defaults(module: &str, defaults: &ModuleDefaults) -> Self {
        Self {
            real_module_name: module.to_string(),
            real_job_name: String::new(),
            override_name: String::new(),
            update_every: defaults.update_every,
            autodetection_retry: defaults.autodetection_retry,
            chart_cleanup: defaults.chart_cleanup,
            max_retries: defaults.max_retries,
        }
    }

    /// Module name as written in `CHART` statements.
    pub fn module_name(&self) -> String {
        format!("{MODULE_NAME_PREFIX}{}", self.real_module_name)
    }

    pub fn job_name(&self) -> &str {
        if !self.override_name.is_empty() {
            &self.override_name
        } else if !self.real_job_name.is_empty() {
            &self.real_job_name
        } else {
            &self.real_module_name
        }
    }

    /// Registry key and chart type prefix.
    pub fn full_name(&self) -> String {
        let job_name = self.job_name();
        if job_name == self.real_module_name {
            self.module_name()
        } else {
            format!("{}_{}", self.module_name(), job_name)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.real_module_name.is_empty() {
            return Err(NetdataPluginError::config("job has no module name"));
        }
        if self.update_every == 0 {
            return Err(NetdataPluginError::config(format!(
                "job '{}': update_every must be at least 1",
                self.full_name()
            )));
        }
        if self.job_name().contains(char::is_whitespace) {
            return Err(NetdataPluginError::config(format!(
                "job '{}': name must not contain whitespace",
                self.job_name()
            )));
        }
        Ok(())
    }
}
