//! Byte stream boundary between a Wi-SUN module and the SKSTACK layer

use async_trait::async_trait;
use routeb_core::{RouteBError, RouteBResult};
use std::io;

/// Polled byte stream of a Wi-SUN module
///
/// Reads never wait indefinitely: the SKSTACK layer polls the stream and
/// uses the quiet periods between bursts of bytes to find block boundaries.
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Read whatever bytes are currently available
    ///
    /// # Returns
    ///
    /// Number of bytes copied into `buf`. `0` means nothing arrived within
    /// the transport's poll interval, not end of stream; `is_closed` tells
    /// the two apart.
    async fn read_once(&mut self, buf: &mut [u8]) -> RouteBResult<usize>;

    /// Write some prefix of `buf`, returning its length
    async fn write(&mut self, buf: &[u8]) -> RouteBResult<usize>;

    /// Write a whole command line or binary payload
    async fn write_all(&mut self, mut buf: &[u8]) -> RouteBResult<()> {
        while !buf.is_empty() {
            match self.write(buf).await? {
                0 => {
                    return Err(RouteBError::Connection(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("Stream accepted none of the last {} bytes", buf.len()),
                    )));
                }
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> RouteBResult<()>;

    /// Whether the stream has ended or was never opened
    fn is_closed(&self) -> bool;

    async fn close(&mut self) -> RouteBResult<()>;
}

/// Stream that has to be opened before use
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    async fn open(&mut self) -> RouteBResult<()>;
}
