use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "go.d.plugin")]
#[command(about = "Runs data collection jobs and reports them to the Netdata agent.")]
#[command(version)]
pub struct Cli {
    /// Debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Module to run, or 'all'
    #[arg(short, long, default_value = "all")]
    pub modules: String,

    /// Configuration directory (overrides the agent's directories)
    #[arg(short, long = "config-dir", env = "GO_D_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Minimum data collection interval in seconds
    #[arg(value_name = "UPDATE_EVERY")]
    pub update_every: Option<u64>,
}
