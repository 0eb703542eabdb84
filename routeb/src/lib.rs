//! routeb - Route-B smart meter access over Wi-SUN SKSTACK modules
//!
//! This library drives an MB-RL7023-11 class Wi-SUN module over a serial
//! line and reads a low-voltage smart electric energy meter through
//! ECHONET Lite.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `routeb-core`: Error taxonomy, device error table, hex field helpers
//! - `routeb-transport`: Byte stream boundary (serial and in-memory)
//! - `routeb-echonet`: ECHONET Lite frame codec and property registry
//! - `routeb-skstack`: Stream multiplexer, event decoder, command transactions
//! - `routeb-client`: Module command wrappers, session bring-up, meter reader
//!
//! # Usage
//!
//! ```no_run
//! use routeb::client::{RouteBSession, SessionSettings};
//! use routeb::transport::{SerialSettings, SerialTransport, TransportLayer};
//!
//! # async fn run() -> routeb::RouteBResult<()> {
//! let mut transport = SerialTransport::new(SerialSettings::new("/dev/ttyUSB0"));
//! transport.open().await?;
//! let session = RouteBSession::start(transport, SessionSettings::new()).await?;
//! println!("{}", session.module().skver().await?);
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use routeb_core::{DeviceError, RouteBError, RouteBResult};

// Re-export transports
pub mod transport {
    pub use routeb_transport::*;
}

// Re-export the ECHONET Lite codec
pub mod echonet {
    pub use routeb_echonet::*;
}

// Re-export the SKSTACK protocol engine
pub mod skstack {
    pub use routeb_skstack::*;
}

// Re-export client API
pub mod client {
    pub use routeb_client::*;
}
