//! Buffered encoder for the plugin protocol statements.

use bytes::{BufMut, BytesMut};
use std::time::Duration;

/// Fields of a `CHART` statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartDefinition<'a> {
    /// Chart type prefix (the owning job's full name)
    pub type_id: &'a str,
    pub id: &'a str,
    pub override_id: &'a str,
    pub title: &'a str,
    pub units: &'a str,
    pub family: &'a str,
    pub context: &'a str,
    /// One of `line`, `area`, `stacked`
    pub chart_type: &'a str,
    pub priority: i64,
    pub update_every: u64,
    /// Space separated chart options
    pub options: &'a str,
    pub module: &'a str,
}

/// Fields of a `DIMENSION` statement.
#[derive(Debug, Clone, Copy, Default)]
pub struct DimensionDefinition<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub algorithm: &'a str,
    pub multiplier: i64,
    pub divisor: i64,
    pub hidden: bool,
}

/// Formats protocol statements into a reusable buffer.
///
/// The writer is stateless with respect to the protocol: it never decides
/// what to emit, it only formats what it is told. Callers hand the buffer
/// to a [`MessageWriter`](crate::MessageWriter) once a batch is complete.
#[derive(Debug)]
pub struct ApiWriter {
    buffer: BytesMut,
}

impl ApiWriter {
    /// Create a new writer with default capacity (4KB)
    pub fn new() -> Self {
        Self::with_capacity(4096)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// `CHART type.id 'overrideID' 'title' 'units' 'family' 'context' chartType priority updateEvery options module`
    pub fn chart(&mut self, chart: &ChartDefinition<'_>) {
        self.write_chart(chart, chart.options);
    }

    /// Retract a chart: the `CHART` statement with `obsolete` in the options field.
    pub fn obsolete(&mut self, chart: &ChartDefinition<'_>) {
        if chart.options.split(' ').any(|opt| opt == "obsolete") {
            self.write_chart(chart, chart.options);
            return;
        }

        let mut options = String::from("obsolete");
        if !chart.options.is_empty() {
            options.push(' ');
            options.push_str(chart.options);
        }
        self.write_chart(chart, &options);
    }

    fn write_chart(&mut self, chart: &ChartDefinition<'_>, options: &str) {
        self.buffer.put_slice(b"CHART ");
        self.put_type_id(chart.type_id, chart.id);
        self.buffer.put_u8(b' ');
        self.put_quoted(chart.override_id);
        self.buffer.put_u8(b' ');
        self.put_quoted(chart.title);
        self.buffer.put_u8(b' ');
        self.put_quoted(chart.units);
        self.buffer.put_u8(b' ');
        self.put_quoted(chart.family);
        self.buffer.put_u8(b' ');
        self.put_quoted(chart.context);
        self.buffer.put_u8(b' ');
        self.buffer.put_slice(chart.chart_type.as_bytes());
        self.buffer.put_u8(b' ');
        self.write_i64(chart.priority);
        self.buffer.put_u8(b' ');
        self.write_u64(chart.update_every);
        self.buffer.put_u8(b' ');
        // An empty options word would shift the module into its place
        if options.is_empty() {
            self.buffer.put_slice(b"''");
        } else {
            self.buffer.put_slice(options.as_bytes());
        }
        self.buffer.put_u8(b' ');
        self.buffer.put_slice(chart.module.as_bytes());
        self.buffer.put_u8(b'\n');
    }

    /// `DIMENSION 'id' 'name' 'algorithm' multiplier divisor hidden`
    pub fn dimension(&mut self, dim: &DimensionDefinition<'_>) {
        self.buffer.put_slice(b"DIMENSION ");
        self.put_quoted(dim.id);
        self.buffer.put_u8(b' ');
        self.put_quoted(dim.name);
        self.buffer.put_u8(b' ');
        self.put_quoted(dim.algorithm);
        self.buffer.put_u8(b' ');
        self.write_i64(dim.multiplier);
        self.buffer.put_u8(b' ');
        self.write_i64(dim.divisor);

        if dim.hidden {
            self.buffer.put_slice(b" hidden");
        }

        self.buffer.put_u8(b'\n');
    }

    /// `BEGIN type.id [sinceLastμs]`
    pub fn begin(&mut self, type_id: &str, id: &str, since_last: Option<Duration>) {
        self.buffer.put_slice(b"BEGIN ");
        self.put_type_id(type_id, id);
        if let Some(since_last) = since_last {
            self.buffer.put_u8(b' ');
            self.write_u64(since_last.as_micros() as u64);
        }
        self.buffer.put_u8(b'\n');
    }

    /// `SET 'id' = value`
    pub fn set(&mut self, id: &str, value: i64) {
        self.buffer.put_slice(b"SET ");
        self.put_quoted(id);
        self.buffer.put_slice(b" = ");
        self.write_i64(value);
        self.buffer.put_u8(b'\n');
    }

    /// `SET 'id' = ` with no value, keeping the row aligned for the consumer.
    pub fn set_empty(&mut self, id: &str) {
        self.buffer.put_slice(b"SET ");
        self.put_quoted(id);
        self.buffer.put_slice(b" = \n");
    }

    /// `VARIABLE CHART 'id' = 'value'`
    pub fn variable(&mut self, id: &str, value: i64) {
        self.buffer.put_slice(b"VARIABLE CHART ");
        self.put_quoted(id);
        self.buffer.put_slice(b" = '");
        self.write_i64(value);
        self.buffer.put_slice(b"'\n");
    }

    pub fn end(&mut self) {
        self.buffer.put_slice(b"END\n");
    }

    /// `FLUSH` asks the agent to drop its partially received state.
    ///
    /// Part of the verb set for plugins that abort a batch half way; the job
    /// runtime writes whole batches and never needs it.
    pub fn flush(&mut self) {
        self.buffer.put_slice(b"FLUSH\n");
    }

    pub fn disable(&mut self) {
        self.buffer.put_slice(b"DISABLE\n");
    }

    /// Get a reference to the buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer without sending it
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn put_type_id(&mut self, type_id: &str, id: &str) {
        self.buffer.put_slice(type_id.as_bytes());
        self.buffer.put_u8(b'.');
        self.buffer.put_slice(id.as_bytes());
    }

    /// Write a single-quoted field. The protocol has no escape mechanism, so
    /// embedded single quotes are replaced by double quotes.
    fn put_quoted(&mut self, value: &str) {
        self.buffer.put_u8(b'\'');
        for (i, chunk) in value.split('\'').enumerate() {
            if i > 0 {
                self.buffer.put_u8(b'"');
            }
            self.buffer.put_slice(chunk.as_bytes());
        }
        self.buffer.put_u8(b'\'');
    }

    #[inline]
    fn write_i64(&mut self, value: i64) {
        let mut buf = itoa::Buffer::new();
        self.buffer.put_slice(buf.format(value).as_bytes());
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        let mut buf = itoa::Buffer::new();
        self.buffer.put_slice(buf.format(value).as_bytes());
    }
}

impl Default for ApiWriter {
    fn default() -> Self {
        Self::new()
    }
}
