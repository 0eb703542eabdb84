//! Route-B client for the MB-RL7023-11 Wi-SUN module
//!
//! This crate provides:
//! - `WisunModule`: one method per SKSTACK command
//! - `Register`: the virtual register table used with `SKSREG`
//! - `RouteBSession`: module start-up, PAN scan and join
//! - `SmartMeterReader`: ECHONET Lite reads of the smart electric energy meter

pub mod module;
pub mod register;
pub mod session;

#[cfg(test)]
mod test_support;

pub use module::{ScanMode, ScanResult, SendSecurity, TableMode, UdpReply, WisunModule};
pub use register::Register;
pub use session::{
    DiscoveredPan, JoinTarget, RouteBCredentials, RouteBSession, SessionSettings,
    SmartMeterReader, ECHONET_LITE_PORT,
};
