//! Registry of the collector modules a plugin knows how to build.

use std::collections::BTreeMap;
use std::fmt;

use netdata_plugin_error::{NetdataPluginError, Result};
use serde::de::DeserializeOwned;

use crate::collector::Collector;

/// Per-module scheduling defaults, overridden by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDefaults {
    pub update_every: u64,
    pub autodetection_retry: u64,
    pub chart_cleanup: u64,
    pub max_retries: u32,
    /// Only run when explicitly enabled in the plugin configuration
    pub disabled_by_default: bool,
}

impl Default for ModuleDefaults {
    fn default() -> Self {
        Self {
            update_every: 1,
            autodetection_retry: 0,
            chart_cleanup: 10,
            max_retries: 0,
            disabled_by_default: false,
        }
    }
}

type CreateFn = dyn Fn(&serde_yaml::Value) -> Result<Box<dyn Collector>> + Send + Sync;

/// Builds collector instances of one module from a raw job mapping.
pub struct Creator {
    pub defaults: ModuleDefaults,
    create: Box<CreateFn>,
}

impl fmt::Debug for Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Creator")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl Creator {
    pub fn new<F>(defaults: ModuleDefaults, create: F) -> Self
    where
        F: Fn(&serde_yaml::Value) -> Result<Box<dyn Collector>> + Send + Sync + 'static,
    {
        Self {
            defaults,
            create: Box::new(create),
        }
    }

    /// A creator that deserializes the collector itself from the job mapping.
    ///
    /// Unknown keys (the scheduling fields) are ignored by serde unless the
    /// collector denies them.
    pub fn from_config<C>(defaults: ModuleDefaults) -> Self
    where
        C: Collector + DeserializeOwned,
    {
        Self::new(defaults, |raw| {
            let collector: C = serde_yaml::from_value(raw.clone())
                .map_err(|e| NetdataPluginError::config(format!("invalid job configuration: {e}")))?;
            Ok(Box::new(collector) as Box<dyn Collector>)
        })
    }

    pub fn create(&self, raw: &serde_yaml::Value) -> Result<Box<dyn Collector>> {
        (self.create)(raw)
    }
}

/// Module name to [`Creator`], handed to the plugin at construction.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    creators: BTreeMap<String, Creator>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, creator: Creator) -> Result<()> {
        if self.creators.contains_key(name) {
            return Err(NetdataPluginError::config(format!(
                "module '{name}' is already registered"
            )));
        }
        self.creators.insert(name.to_string(), creator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Creator> {
        self.creators.get(name)
    }

    /// Modules in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Creator)> {
        self.creators.iter().map(|(name, creator)| (name.as_str(), creator))
    }

    pub fn len(&self) -> usize {
        self.creators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.creators.is_empty()
    }
}
