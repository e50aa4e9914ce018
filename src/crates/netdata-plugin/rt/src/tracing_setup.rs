//! Tracing configuration for collection plugins
//!
//! Standard output carries the plugin protocol, so logs never go there:
//! - Systemd journal logging (when running under Netdata with journal configured)
//! - Stderr logging otherwise

use tracing_subscriber::{EnvFilter, prelude::*};

use crate::netdata_env::NetdataEnv;

/// Output destination for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogOutput {
    Journal,
    Stderr,
}

impl LogOutput {
    fn detect(netdata_env: &NetdataEnv) -> Self {
        if netdata_env.systemd_journal_path.is_some() {
            LogOutput::Journal
        } else {
            LogOutput::Stderr
        }
    }

    fn description(&self) -> &'static str {
        match self {
            LogOutput::Journal => "systemd journal",
            LogOutput::Stderr => "stderr",
        }
    }
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
}

/// Initialize tracing for the environment the agent started us in.
///
/// Respects RUST_LOG env var, otherwise uses the provided default filter.
/// Falls back to stderr when the journal socket cannot be reached.
pub fn init_tracing(default_filter: &str, netdata_env: &NetdataEnv) {
    let mut output = LogOutput::detect(netdata_env);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);

    match output {
        LogOutput::Journal => match tracing_journald::layer() {
            Ok(journald_layer) => registry.with(journald_layer).init(),
            Err(e) => {
                registry.with(stderr_layer()).init();
                tracing::warn!("failed to connect to journald: {}", e);
                output = LogOutput::Stderr;
            }
        },
        LogOutput::Stderr => registry.with(stderr_layer()).init(),
    }

    tracing::info!(
        output = ?output,
        "tracing initialized, logging to {} with filter '{}'",
        output.description(),
        default_filter,
    );
}
