//! Stream accessor trait for transport layer

use eip_core::{EipError, EipResult};
use async_trait::async_trait;
use std::time::Duration;

/// Stream accessor interface to a byte stream connected to a target device
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Set the read/write deadline
    ///
    /// # Arguments
    ///
    /// * `timeout` - The timeout duration. None means infinite timeout.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> EipResult<()>;

    /// Read data from the stream
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if the peer closed the stream
    async fn read(&mut self, buf: &mut [u8]) -> EipResult<usize>;

    /// Read exact number of bytes from the stream
    ///
    /// # Arguments
    ///
    /// * `buf` - Buffer to read into, will be filled completely
    ///
    /// # Errors
    ///
    /// Returns `EipError::ConnectionClosed` if the stream ends before `buf` is full
    async fn read_exact(&mut self, mut buf: &mut [u8]) -> EipResult<()> {
        while !buf.is_empty() {
            let n = self.read(buf).await?;
            if n == 0 {
                return Err(EipError::ConnectionClosed);
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }

    /// Write data to the stream
    ///
    /// # Returns
    ///
    /// Number of bytes written, which may be less than `buf.len()`
    async fn write(&mut self, buf: &[u8]) -> EipResult<usize>;

    /// Write all data to the stream, resuming after partial writes
    async fn write_all(&mut self, buf: &[u8]) -> EipResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(EipError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Flush any buffered data
    async fn flush(&mut self) -> EipResult<()>;

    /// Check if the stream is closed
    fn is_closed(&self) -> bool;

    /// Close the stream
    async fn close(&mut self) -> EipResult<()>;
}

/// Transport layer trait that extends StreamAccessor
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Open the physical connection
    ///
    /// # Errors
    ///
    /// Returns `EipError::Connect` if the socket cannot be opened
    async fn open(&mut self) -> EipResult<()>;
}
