//! ECHONET Lite properties
//!
//! A property on the wire is an EPC byte, a PDC length byte and PDC bytes of
//! EDT. `RawProperty` keeps exactly that. `Property` is the decoded form:
//! either a variant of a registered object class, or the raw bytes when no
//! decoder applies.

use crate::smart_meter::SmartMeterProperty;
use routeb_core::{RouteBError, RouteBResult};

/// Undecoded property (EPC + EDT)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawProperty {
    /// ECHONET property code
    pub epc: u8,
    /// Property value data; its length is the PDC
    pub edt: Vec<u8>,
}

impl RawProperty {
    /// Create a raw property
    #[must_use]
    pub fn new(epc: u8, edt: Vec<u8>) -> Self {
        Self { epc, edt }
    }

    /// Property with an empty EDT, as used in Get requests
    #[must_use]
    pub fn request(epc: u8) -> Self {
        Self { epc, edt: Vec::new() }
    }

    /// Property data counter
    pub fn pdc(&self) -> usize {
        self.edt.len()
    }

    /// Fail with `PropertyMismatch` unless this property carries `expected`
    pub fn expect_epc(&self, expected: u8) -> RouteBResult<()> {
        if self.epc != expected {
            return Err(RouteBError::PropertyMismatch {
                expected,
                actual: self.epc,
            });
        }
        Ok(())
    }

    /// Fail with `InvalidPropertyData` unless the EDT is exactly `len` bytes
    pub fn expect_len(&self, len: usize) -> RouteBResult<()> {
        if self.edt.len() != len {
            return Err(RouteBError::InvalidPropertyData(format!(
                "EPC 0x{:02X}: expected {} bytes, got {}",
                self.epc,
                len,
                self.edt.len()
            )));
        }
        Ok(())
    }
}

/// Decoded property
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    /// Property of the low-voltage smart electric energy meter class
    SmartMeter(SmartMeterProperty),
    /// Property without a registered decoder; round-trips its bytes as-is
    Unknown(RawProperty),
}

impl Property {
    /// Property code of this property
    pub fn epc(&self) -> u8 {
        match self {
            Property::SmartMeter(p) => p.epc(),
            Property::Unknown(raw) => raw.epc,
        }
    }

    /// Encode back into wire form
    pub fn to_raw(&self) -> RawProperty {
        match self {
            Property::SmartMeter(p) => p.encode(),
            Property::Unknown(raw) => raw.clone(),
        }
    }
}

impl From<RawProperty> for Property {
    fn from(raw: RawProperty) -> Self {
        Property::Unknown(raw)
    }
}

impl From<SmartMeterProperty> for Property {
    fn from(property: SmartMeterProperty) -> Self {
        Property::SmartMeter(property)
    }
}

impl From<&Property> for RawProperty {
    fn from(property: &Property) -> Self {
        property.to_raw()
    }
}

impl From<Property> for RawProperty {
    fn from(property: Property) -> Self {
        property.to_raw()
    }
}

impl From<SmartMeterProperty> for RawProperty {
    fn from(property: SmartMeterProperty) -> Self {
        property.encode()
    }
}
