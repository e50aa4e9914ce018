use crate::api_writer::ApiWriter;
use netdata_plugin_error::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writer for sending protocol statements to the parent process.
///
/// Every job formats its statements into its own [`ApiWriter`] and hands
/// the complete batch over in one call, so statements of different jobs
/// never interleave on the stream.
#[derive(Debug)]
pub struct MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    writer: W,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a new message writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write the buffered statements and clear the buffer.
    ///
    /// An empty buffer is a no-op.
    pub async fn send(&mut self, api: &mut ApiWriter) -> Result<()> {
        if api.is_empty() {
            return Ok(());
        }
        self.write_raw(api.buffer()).await?;
        api.clear();
        Ok(())
    }

    /// Write raw bytes directly to the underlying writer
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl MessageWriter<tokio::io::Stdout> {
    /// Create a message writer on stdout
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}
