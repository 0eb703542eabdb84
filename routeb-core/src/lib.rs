//! Core types and utilities for the Route-B stack
//!
//! This crate provides the error taxonomy, the SKSTACK device error table and
//! the fixed-width hexadecimal field helpers used throughout the workspace.

pub mod device_error;
pub mod error;
pub mod hex;

pub use device_error::{DeviceError, FAIL_MARKER};
pub use error::{RouteBError, RouteBResult};
