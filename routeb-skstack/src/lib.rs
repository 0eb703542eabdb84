//! SKSTACK protocol engine for the Route-B stack
//!
//! This crate turns the byte stream of a Wi-SUN module into line blocks,
//! typed events and command transactions:
//! - `StreamMultiplexer` reads the stream and broadcasts line blocks
//! - `decode_events` classifies lines into `Event` values
//! - `CommandExecutor` runs one command at a time against the multiplexer
//! - `PendingReply` correlates a UDP reception with the frame that was sent
//! - `EventSubscription` forwards every decoded event to a channel

pub mod correlator;
pub mod event;
pub mod executor;
pub mod multiplexer;
pub mod subscription;

pub use correlator::{LocalBindings, Mismatch, PendingReply};
pub use event::{decode_events, Event, EventCode};
pub use executor::{CommandExecutor, CommandRequest, CommandResponse, ExecutorSettings};
pub use multiplexer::{
    BlockAccumulator, DebounceSettings, LineBlock, Observer, ObserverId, ObserverRegistry,
    PollOutcome, StreamMultiplexer,
};
pub use subscription::EventSubscription;
