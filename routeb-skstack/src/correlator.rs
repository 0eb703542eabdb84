//! Response correlation for UDP sends
//!
//! A reply to `SKSENDTO` is recognised only by weak identity fields: the
//! addresses and ports of the `ERXUDP` line and the ECHONET Lite transaction
//! id carried in its payload.

use crate::event::UdpReceived;
use routeb_core::{RouteBError, RouteBResult};
use routeb_echonet::{EchonetFrame, TransactionId};
use std::fmt;

/// Local addresses and UDP ports reported by the module
///
/// UDP handles are 1-based: handle `n` listens on `udp_ports[n - 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalBindings {
    pub addresses: Vec<String>,
    pub udp_ports: Vec<u16>,
}

impl LocalBindings {
    pub fn new(addresses: Vec<String>, udp_ports: Vec<u16>) -> Self {
        Self {
            addresses,
            udp_ports,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.udp_ports.is_empty()
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.addresses.iter().any(|a| a == address)
    }

    /// Local port bound to a UDP handle
    pub fn local_port(&self, handle: u8) -> Option<u16> {
        let index = usize::from(handle).checked_sub(1)?;
        self.udp_ports.get(index).copied()
    }
}

/// Field that disqualified a reception
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    Sender { expected: String, actual: String },
    Destination { actual: String },
    SourcePort { expected: u16, actual: u16 },
    DestinationPort { expected: u16, actual: u16 },
    Payload(String),
    TransactionId { expected: u16, actual: u16 },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Sender { expected, actual } => {
                write!(f, "sender mismatch: expected {}, got {}", expected, actual)
            }
            Mismatch::Destination { actual } => {
                write!(f, "receiver mismatch: {} is not a local address", actual)
            }
            Mismatch::SourcePort { expected, actual } => write!(
                f,
                "source port mismatch: expected {:04X}, got {:04X}",
                expected, actual
            ),
            Mismatch::DestinationPort { expected, actual } => write!(
                f,
                "destination port mismatch: expected {:04X}, got {:04X}",
                expected, actual
            ),
            Mismatch::Payload(reason) => write!(f, "payload is not ECHONET Lite: {}", reason),
            Mismatch::TransactionId { expected, actual } => write!(
                f,
                "transaction id mismatch: expected {:04X}, got {:04X}",
                expected, actual
            ),
        }
    }
}

/// Identity of the reply expected for one UDP send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub address: String,
    pub remote_port: u16,
    pub local_port: u16,
    pub transaction_id: TransactionId,
    local_addresses: Vec<String>,
}

impl PendingReply {
    /// Prepare the correlation of a send through `handle`
    ///
    /// # Returns
    ///
    /// `AddressUnavailable` if no local address is known, `PortUnavailable`
    /// if `handle` has no bound port
    pub fn new(
        bindings: &LocalBindings,
        handle: u8,
        address: impl Into<String>,
        remote_port: u16,
        transaction_id: TransactionId,
    ) -> RouteBResult<Self> {
        if bindings.addresses.is_empty() {
            return Err(RouteBError::AddressUnavailable);
        }
        let local_port = bindings
            .local_port(handle)
            .ok_or(RouteBError::PortUnavailable)?;

        Ok(Self {
            address: address.into(),
            remote_port,
            local_port,
            transaction_id,
            local_addresses: bindings.addresses.clone(),
        })
    }

    /// Check a reception field by field
    ///
    /// # Returns
    ///
    /// The decoded reply frame, or the first field that does not match
    pub fn check(&self, received: &UdpReceived) -> Result<EchonetFrame, Mismatch> {
        if received.sender != self.address {
            return Err(Mismatch::Sender {
                expected: self.address.clone(),
                actual: received.sender.clone(),
            });
        }
        if !self.local_addresses.iter().any(|a| *a == received.destination) {
            return Err(Mismatch::Destination {
                actual: received.destination.clone(),
            });
        }
        if received.remote_port != self.remote_port {
            return Err(Mismatch::SourcePort {
                expected: self.remote_port,
                actual: received.remote_port,
            });
        }
        if received.local_port != self.local_port {
            return Err(Mismatch::DestinationPort {
                expected: self.local_port,
                actual: received.local_port,
            });
        }

        let frame =
            EchonetFrame::decode(&received.data).map_err(|e| Mismatch::Payload(e.to_string()))?;
        if frame.tid != self.transaction_id {
            return Err(Mismatch::TransactionId {
                expected: self.transaction_id.value(),
                actual: frame.tid.value(),
            });
        }
        Ok(frame)
    }

    /// The reply frame if `received` matches; mismatches are logged
    pub fn accept(&self, received: &UdpReceived) -> Option<EchonetFrame> {
        match self.check(received) {
            Ok(frame) => Some(frame),
            Err(mismatch) => {
                log::debug!("Ignoring ERXUDP from {}: {}", received.sender, mismatch);
                None
            }
        }
    }
}
