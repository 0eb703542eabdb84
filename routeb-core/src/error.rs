use crate::device_error::DeviceError;
use thiserror::Error;

/// Main error type for Route-B operations
///
/// The variants fall into four groups:
/// - transport failures (`Connection`), fatal for the session
/// - decode failures (`InvalidEvent`, `InvalidPacket`, `PropertyMismatch`,
///   `InvalidPropertyData`), recovered locally by skipping the unit
/// - protocol failures surfaced to the command caller (`EchobackMismatch`,
///   `UnexpectedOutput`, `Device`, `Timeout`, `Cancelled`)
/// - module state failures (`NotStreaming`, `AddressUnavailable`, ...)
#[derive(Error, Debug)]
pub enum RouteBError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,

    #[error("Echoback mismatch: {0}")]
    EchobackMismatch(String),

    #[error("Unexpected output: {0}")]
    UnexpectedOutput(String),

    #[error("Device error: {0}")]
    Device(DeviceError),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Property mismatch: expected EPC 0x{expected:02X}, got 0x{actual:02X}")]
    PropertyMismatch { expected: u8, actual: u8 },

    #[error("Invalid property data: {0}")]
    InvalidPropertyData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Already streaming")]
    AlreadyStreaming,

    #[error("Not streaming")]
    NotStreaming,

    #[error("Address unavailable")]
    AddressUnavailable,

    #[error("Port unavailable")]
    PortUnavailable,

    #[error("Failed to connect")]
    FailedToConnect,
}

impl RouteBError {
    /// Whether this error leaves the serial session unusable
    pub fn is_fatal(&self) -> bool {
        matches!(self, RouteBError::Connection(_))
    }
}

impl From<DeviceError> for RouteBError {
    fn from(error: DeviceError) -> Self {
        RouteBError::Device(error)
    }
}

/// Result type alias for Route-B operations
pub type RouteBResult<T> = Result<T, RouteBError>;
