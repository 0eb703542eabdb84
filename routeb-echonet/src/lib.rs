//! ECHONET Lite application layer for the Route-B stack
//!
//! This crate provides:
//! - The binary frame codec (`EchonetFrame`)
//! - Raw and typed properties (`RawProperty`, `Property`)
//! - The per-object-class decoder registry (`PropertyRegistry`)
//! - The low-voltage smart electric energy meter class (0x0288)

pub mod frame;
pub mod property;
pub mod registry;
pub mod smart_meter;

pub use frame::{EchonetFrame, EchonetObject, Esv, TransactionId, EHD1_ECHONET_LITE, EHD2_SPECIFIED_FORMAT};
pub use property::{Property, RawProperty};
pub use registry::{PropertyDecoder, PropertyRegistry};
pub use smart_meter::SmartMeterProperty;
