//! Modules built into the plugin.

mod example;

use netdata_plugin_error::Result;
use rt::{Creator, ModuleDefaults, ModuleRegistry};

/// Registry of every built-in module.
pub fn registry() -> Result<ModuleRegistry> {
    let mut modules = ModuleRegistry::new();

    modules.register(
        "example",
        Creator::from_config::<example::Example>(ModuleDefaults::default()),
    )?;

    Ok(modules)
}
