//! Fixed-width hexadecimal field helpers
//!
//! SKSTACK prints every numeric field as uppercase hexadecimal with two
//! digits per byte. Parsing is strict: a field with the wrong number of digits
//! is rejected instead of being silently widened or truncated.

use crate::error::{RouteBError, RouteBResult};

fn check_digits(field: &str, width: usize) -> RouteBResult<()> {
    if field.len() != width {
        return Err(RouteBError::InvalidData(format!(
            "Expected {} hex digits, got {:?}",
            width, field
        )));
    }
    if !field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(RouteBError::InvalidData(format!(
            "Invalid hex field: {:?}",
            field
        )));
    }
    Ok(())
}

/// Parse a one-byte field (2 digits)
pub fn parse_u8(field: &str) -> RouteBResult<u8> {
    check_digits(field, 2)?;
    u8::from_str_radix(field, 16).map_err(|e| RouteBError::InvalidData(e.to_string()))
}

/// Parse a two-byte field (4 digits)
pub fn parse_u16(field: &str) -> RouteBResult<u16> {
    check_digits(field, 4)?;
    u16::from_str_radix(field, 16).map_err(|e| RouteBError::InvalidData(e.to_string()))
}

/// Parse a four-byte field (8 digits)
pub fn parse_u32(field: &str) -> RouteBResult<u32> {
    check_digits(field, 8)?;
    u32::from_str_radix(field, 16).map_err(|e| RouteBError::InvalidData(e.to_string()))
}

/// Parse an eight-byte field (16 digits), e.g. a MAC address
pub fn parse_u64(field: &str) -> RouteBResult<u64> {
    check_digits(field, 16)?;
    u64::from_str_radix(field, 16).map_err(|e| RouteBError::InvalidData(e.to_string()))
}

/// Parse a single-digit flag field such as `Side` or the ERXUDP reserved
/// column
///
/// These columns are documented as one hex digit; two digits are accepted as
/// well because some firmware revisions pad them.
pub fn parse_flag(field: &str) -> RouteBResult<u8> {
    if field.len() == 1 {
        check_digits(field, 1)?;
    } else {
        check_digits(field, 2)?;
    }
    u8::from_str_radix(field, 16).map_err(|e| RouteBError::InvalidData(e.to_string()))
}

/// Parse a boolean token
///
/// Accepts `1`, `t`, `T`, `true`, `TRUE`, `True` and the matching false
/// spellings; anything else is rejected.
pub fn parse_bool(field: &str) -> RouteBResult<bool> {
    match field {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(RouteBError::InvalidData(format!(
            "Invalid boolean token: {:?}",
            field
        ))),
    }
}

/// Decode a token of hex pairs without separators
pub fn decode_bytes(token: &str) -> RouteBResult<Vec<u8>> {
    if token.len() % 2 != 0 {
        return Err(RouteBError::InvalidData(format!(
            "Odd number of hex digits in payload: {}",
            token.len()
        )));
    }
    token
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair)
                .map_err(|e| RouteBError::InvalidData(e.to_string()))?;
            parse_u8(pair)
        })
        .collect()
}

/// Encode bytes as an uppercase hex-pair token
pub fn encode_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
