//! In-memory transport
//!
//! `MemoryTransport` is the host side of a pair of unbounded channels and
//! `MemoryPeer` plays the Wi-SUN module. It is used to replay captured serial
//! traffic and to script device behaviour in tests.

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use routeb_core::{RouteBError, RouteBResult};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Create a connected transport/peer pair
pub fn memory_pair() -> (MemoryTransport, MemoryPeer) {
    let (to_host, from_peer) = mpsc::unbounded_channel();
    let (to_peer, from_host) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            incoming: from_peer,
            outgoing: to_peer,
            pending: BytesMut::new(),
            closed: false,
        },
        MemoryPeer {
            outgoing: Some(to_host),
            incoming: from_host,
        },
    )
}

/// Host side of an in-memory byte stream
#[derive(Debug)]
pub struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<Vec<u8>>,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    pending: BytesMut,
    closed: bool,
}

#[async_trait]
impl TransportLayer for MemoryTransport {
    async fn open(&mut self) -> RouteBResult<()> {
        if self.closed {
            return Err(RouteBError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Memory transport cannot be reopened",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for MemoryTransport {
    async fn read_once(&mut self, buf: &mut [u8]) -> RouteBResult<usize> {
        if self.pending.is_empty() {
            match self.incoming.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => return Ok(0),
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    return Ok(0);
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }

    async fn write(&mut self, buf: &[u8]) -> RouteBResult<usize> {
        if self.closed {
            return Err(RouteBError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Memory transport is closed",
            )));
        }
        self.outgoing.send(buf.to_vec()).map_err(|_| {
            RouteBError::Connection(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "Memory peer dropped",
            ))
        })?;
        Ok(buf.len())
    }

    async fn flush(&mut self) -> RouteBResult<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> RouteBResult<()> {
        self.incoming.close();
        self.closed = true;
        Ok(())
    }
}

/// Device side of an in-memory byte stream
#[derive(Debug)]
pub struct MemoryPeer {
    outgoing: Option<mpsc::UnboundedSender<Vec<u8>>>,
    incoming: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryPeer {
    /// Send raw bytes to the host
    ///
    /// Returns `false` once the host side has gone away.
    pub fn send(&self, bytes: impl AsRef<[u8]>) -> bool {
        match &self.outgoing {
            Some(tx) => tx.send(bytes.as_ref().to_vec()).is_ok(),
            None => false,
        }
    }

    /// Send each line terminated by CRLF, as one chunk
    pub fn send_lines(&self, lines: &[&str]) -> bool {
        let mut data = String::new();
        for line in lines {
            data.push_str(line);
            data.push_str("\r\n");
        }
        self.send(data)
    }

    /// Wait for the next chunk the host wrote
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.incoming.recv().await
    }

    /// Take the next written chunk if one is already queued
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.incoming.try_recv().ok()
    }

    /// Close the device side; the host observes end of stream
    pub fn close(&mut self) {
        self.outgoing = None;
    }
}
