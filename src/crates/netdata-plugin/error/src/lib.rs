use thiserror::Error;

/// Result type for netdata plugin operations
pub type Result<T> = std::result::Result<T, NetdataPluginError>;

/// Error types that can occur while orchestrating collection jobs
#[derive(Error, Debug)]
pub enum NetdataPluginError {
    /// Transport layer error (I/O on the protocol stream)
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Runtime error during plugin execution
    #[error("runtime error: {message}")]
    Runtime { message: String },

    /// Configuration error (bad YAML, failed validation)
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Collector failed to initialize or violated its contract
    #[error("collector error: {message}")]
    Collector { message: String },

    /// Chart contract violation (duplicate chart, dimension or variable)
    #[error("chart error: {message}")]
    Chart { message: String },
}

impl NetdataPluginError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn collector(message: impl Into<String>) -> Self {
        Self::Collector {
            message: message.into(),
        }
    }

    pub fn chart(message: impl Into<String>) -> Self {
        Self::Chart {
            message: message.into(),
        }
    }
}
