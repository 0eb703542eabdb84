//! SKSTACK device error codes
//!
//! A failed command is answered with a single `FAIL ERnn` line. The numeric
//! code maps onto a fixed table; anything outside the table is kept as
//! `Unknown` so that callers can still report it.

use std::fmt;
use thiserror::Error;

/// Prefix of every device failure line
pub const FAIL_MARKER: &str = "FAIL";

const ERROR_CODE_PREFIX: &str = "FAIL ER";

/// Device-reported failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("reserved (ER01)")]
    Reserved1,
    #[error("reserved (ER02)")]
    Reserved2,
    #[error("reserved (ER03)")]
    Reserved3,
    /// ER04: the command is not supported
    #[error("command not supported (ER04)")]
    CommandNotSupported,
    /// ER05: wrong number of arguments
    #[error("invalid parameter length (ER05)")]
    InvalidParameterLength,
    /// ER06: argument format or range is wrong
    #[error("invalid parameter (ER06)")]
    InvalidParameter,
    #[error("reserved (ER07)")]
    Reserved7,
    #[error("reserved (ER08)")]
    Reserved8,
    /// ER09: UART input error
    #[error("uart input error (ER09)")]
    UartInputError,
    /// ER10: the command was accepted but its execution failed
    #[error("command failed (ER10)")]
    CommandFailed,
    /// A failure line whose code is not in the table
    #[error("unknown device error: {0}")]
    Unknown(String),
}

impl DeviceError {
    /// Map a numeric `ERnn` code onto the table
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => DeviceError::Reserved1,
            2 => DeviceError::Reserved2,
            3 => DeviceError::Reserved3,
            4 => DeviceError::CommandNotSupported,
            5 => DeviceError::InvalidParameterLength,
            6 => DeviceError::InvalidParameter,
            7 => DeviceError::Reserved7,
            8 => DeviceError::Reserved8,
            9 => DeviceError::UartInputError,
            10 => DeviceError::CommandFailed,
            other => DeviceError::Unknown(ErrorCode(other).to_string()),
        }
    }

    /// Parse a `FAIL ERnn` line
    ///
    /// Lines that do not carry a decimal code after `FAIL ER` are reported as
    /// `Unknown` with the line itself.
    pub fn from_fail_line(line: &str) -> Self {
        let Some(code) = line.trim_end().strip_prefix(ERROR_CODE_PREFIX) else {
            return DeviceError::Unknown(line.to_string());
        };
        match code.parse::<u8>() {
            Ok(code) => Self::from_code(code),
            Err(_) => DeviceError::Unknown(line.to_string()),
        }
    }

    /// Numeric code, if the error is in the table
    pub fn code(&self) -> Option<u8> {
        let code = match self {
            DeviceError::Reserved1 => 1,
            DeviceError::Reserved2 => 2,
            DeviceError::Reserved3 => 3,
            DeviceError::CommandNotSupported => 4,
            DeviceError::InvalidParameterLength => 5,
            DeviceError::InvalidParameter => 6,
            DeviceError::Reserved7 => 7,
            DeviceError::Reserved8 => 8,
            DeviceError::UartInputError => 9,
            DeviceError::CommandFailed => 10,
            DeviceError::Unknown(_) => return None,
        };
        Some(code)
    }
}

/// `ERnn` formatting helper
#[derive(Debug, Clone, Copy)]
struct ErrorCode(u8);

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ER{:02}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(DeviceError::from_fail_line("FAIL ER04"), DeviceError::CommandNotSupported);
        assert_eq!(DeviceError::from_fail_line("FAIL ER06"), DeviceError::InvalidParameter);
        assert_eq!(DeviceError::from_fail_line("FAIL ER10"), DeviceError::CommandFailed);
        assert_eq!(DeviceError::CommandFailed.code(), Some(10));
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(
            DeviceError::from_fail_line("FAIL ER42"),
            DeviceError::Unknown("ER42".to_string())
        );
        assert!(matches!(DeviceError::from_fail_line("FAIL"), DeviceError::Unknown(_)));
        assert!(matches!(DeviceError::from_fail_line("FAIL ERxx"), DeviceError::Unknown(_)));
        assert_eq!(DeviceError::from_fail_line("FAIL ER42").code(), None);
    }
}
