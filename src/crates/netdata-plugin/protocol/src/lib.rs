//! Netdata external plugin protocol: statement encoding and output transport.

mod api_writer;
mod transport;

pub use api_writer::{ApiWriter, ChartDefinition, DimensionDefinition};
pub use netdata_plugin_error::{NetdataPluginError, Result};
pub use transport::MessageWriter;
