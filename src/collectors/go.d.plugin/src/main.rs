//! go.d.plugin standalone binary

mod cli;
mod config;
mod modules;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rt::{NetdataEnv, Plugin};
use tokio::runtime::Runtime;

use crate::cli::Cli;
use crate::config::ConfigLocator;

const PLUGIN_NAME: &str = "go.d";

/// How long exiting waits for collector calls still running on blocking threads.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Drive `future` to completion, then shut the runtime down without waiting
/// for collector calls that never returned.
fn block_on_bounded<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    output
}

fn run(cli: Cli, netdata_env: NetdataEnv) -> Result<()> {
    let locator = ConfigLocator::new(cli.config_dir.as_deref(), &netdata_env);
    let mut config = locator.plugin_config()?;
    let modules = modules::registry().context("registering modules")?;

    let mut module_configs = Vec::new();
    for (name, _) in modules.iter() {
        match locator.module_config(name) {
            Ok(Some(module_config)) => module_configs.push((name.to_string(), module_config)),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("disabling module '{}': {:#}", name, e);
                config.modules.insert(name.to_string(), false);
            }
        }
    }

    let min_update_every = cli.update_every.or(netdata_env.update_every).unwrap_or(1);

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if config.max_procs > 0 {
        builder.worker_threads(config.max_procs);
    }
    let runtime = builder.build().context("building the async runtime")?;

    let mut plugin = Plugin::new(PLUGIN_NAME, config, modules)
        .with_module_filter(Some(&cli.modules))
        .with_min_update_every(min_update_every);
    for (name, module_config) in module_configs {
        plugin = plugin.with_module_config(&name, module_config);
    }

    block_on_bounded(runtime, plugin.run()).context("plugin runtime error")
}

fn main() {
    let cli = Cli::parse();
    let netdata_env = NetdataEnv::from_environment();

    let filter = if cli.debug {
        "debug"
    } else {
        netdata_env
            .log_level
            .map(|level| level.as_filter())
            .unwrap_or("info")
    };
    rt::init_tracing(filter, &netdata_env);

    if let Err(err) = run(cli, netdata_env) {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}
