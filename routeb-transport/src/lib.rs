//! Transport layer module for the Route-B stack
//!
//! This crate provides the byte stream boundary the SKSTACK layer reads from
//! and writes to, a serial port implementation for the Wi-SUN module, and an
//! in-memory implementation used to replay captures and script a device in
//! tests.

pub mod memory;
pub mod serial;
pub mod stream;

pub use memory::{memory_pair, MemoryPeer, MemoryTransport};
pub use routeb_core::{RouteBError, RouteBResult};
pub use serial::{SerialSettings, SerialTransport};
pub use stream::{StreamAccessor, TransportLayer};
