//! ECHONET Lite frame codec
//!
//! Layout of a specified-format (EHD2 = 0x81) frame:
//!
//! ```text
//! +------+------+-------+--------+--------+-----+-----+-----+-----+-----+-----
//! | EHD1 | EHD2 | TID   | SEOJ   | DEOJ   | ESV | OPC | EPC | PDC | EDT | ...
//! | 0x10 | 0x81 | 2 B   | 3 B    | 3 B    | 1 B | 1 B | 1 B | 1 B | PDC |
//! +------+------+-------+--------+--------+-----+-----+-----+-----+-----+-----
//! ```
//!
//! OPC is the number of (EPC, PDC, EDT) triplets that follow.

use crate::property::{Property, RawProperty};
use crate::registry::PropertyRegistry;
use bytes::{Buf, BufMut, BytesMut};
use routeb_core::{RouteBError, RouteBResult};
use std::fmt;

/// EHD1 value for ECHONET Lite
pub const EHD1_ECHONET_LITE: u8 = 0x10;
/// EHD2 value for the specified message format
pub const EHD2_SPECIFIED_FORMAT: u8 = 0x81;
/// EHD2 value for the arbitrary message format (not decoded)
pub const EHD2_ARBITRARY_FORMAT: u8 = 0x82;

/// Size of the fixed part of a frame, OPC included
pub const HEADER_LEN: usize = 12;

/// ECHONET Lite service code
///
/// Codes compare and hash by their wire byte, so `Esv::Other(0x62)` equals
/// `Esv::Get`. `from_u8` always yields the named variant.
#[derive(Debug, Clone, Copy)]
pub enum Esv {
    /// Property value write request (no response required)
    SetI,
    /// Property value write request (response required)
    SetC,
    /// Property value read request
    Get,
    /// Property value notification request
    InfReq,
    /// Property value write & read request
    SetGet,
    /// Property value write response
    SetRes,
    /// Property value read response
    GetRes,
    /// Property value notification
    Inf,
    /// Property value notification (response required)
    Infc,
    /// Property value notification response
    InfcRes,
    /// Property value write & read response
    SetGetRes,
    /// Property value write request not possible (SetI)
    SetISna,
    /// Property value write request not possible (SetC)
    SetCSna,
    /// Property value read not possible
    GetSna,
    /// Property value notification not possible
    InfSna,
    /// Property value write & read not possible
    SetGetSna,
    /// Any other service code
    Other(u8),
}

impl Esv {
    /// Create from the wire byte
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x60 => Esv::SetI,
            0x61 => Esv::SetC,
            0x62 => Esv::Get,
            0x63 => Esv::InfReq,
            0x6E => Esv::SetGet,
            0x71 => Esv::SetRes,
            0x72 => Esv::GetRes,
            0x73 => Esv::Inf,
            0x74 => Esv::Infc,
            0x7A => Esv::InfcRes,
            0x7E => Esv::SetGetRes,
            0x50 => Esv::SetISna,
            0x51 => Esv::SetCSna,
            0x52 => Esv::GetSna,
            0x53 => Esv::InfSna,
            0x5E => Esv::SetGetSna,
            other => Esv::Other(other),
        }
    }

    /// Wire byte
    pub fn as_u8(&self) -> u8 {
        match self {
            Esv::SetI => 0x60,
            Esv::SetC => 0x61,
            Esv::Get => 0x62,
            Esv::InfReq => 0x63,
            Esv::SetGet => 0x6E,
            Esv::SetRes => 0x71,
            Esv::GetRes => 0x72,
            Esv::Inf => 0x73,
            Esv::Infc => 0x74,
            Esv::InfcRes => 0x7A,
            Esv::SetGetRes => 0x7E,
            Esv::SetISna => 0x50,
            Esv::SetCSna => 0x51,
            Esv::GetSna => 0x52,
            Esv::InfSna => 0x53,
            Esv::SetGetSna => 0x5E,
            Esv::Other(value) => *value,
        }
    }

    /// Named variant for a catalogued code, `Other` otherwise
    #[must_use]
    pub fn normalized(self) -> Self {
        Esv::from_u8(self.as_u8())
    }

    /// Whether this is one of the "not possible" responses
    pub fn is_error_response(&self) -> bool {
        matches!(self.as_u8(), 0x50..=0x5F)
    }
}

impl PartialEq for Esv {
    fn eq(&self, other: &Self) -> bool {
        self.as_u8() == other.as_u8()
    }
}

impl Eq for Esv {}

impl std::hash::Hash for Esv {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_u8().hash(state);
    }
}

impl From<u8> for Esv {
    fn from(value: u8) -> Self {
        Esv::from_u8(value)
    }
}

/// ECHONET object specifier (class group, class, instance)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EchonetObject(pub [u8; 3]);

impl EchonetObject {
    /// Controller object, instance 1
    pub const CONTROLLER: EchonetObject = EchonetObject([0x05, 0xFF, 0x01]);
    /// Low-voltage smart electric energy meter, instance 1
    pub const SMART_METER: EchonetObject = EchonetObject([0x02, 0x88, 0x01]);

    /// Create an object specifier
    #[must_use]
    pub const fn new(class_group: u8, class: u8, instance: u8) -> Self {
        Self([class_group, class, instance])
    }

    /// Class group code
    pub fn class_group(&self) -> u8 {
        self.0[0]
    }

    /// Class code
    pub fn class(&self) -> u8 {
        self.0[1]
    }

    /// Instance code
    pub fn instance(&self) -> u8 {
        self.0[2]
    }

    /// (class group, class) key used by the property registry
    pub fn class_key(&self) -> (u8, u8) {
        (self.0[0], self.0[1])
    }
}

impl fmt::Display for EchonetObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

/// Transaction ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TransactionId(pub u16);

impl TransactionId {
    /// Next transaction ID, wrapping at 0xFFFF
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl From<u16> for TransactionId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

/// ECHONET Lite frame (specified message format)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchonetFrame {
    /// Transaction ID
    pub tid: TransactionId,
    /// Source object
    pub seoj: EchonetObject,
    /// Destination object
    pub deoj: EchonetObject,
    /// Service code
    pub esv: Esv,
    /// Properties in wire order
    pub properties: Vec<RawProperty>,
}

impl EchonetFrame {
    /// Create a frame without properties
    #[must_use]
    pub fn new(tid: TransactionId, seoj: EchonetObject, deoj: EchonetObject, esv: Esv) -> Self {
        Self {
            tid,
            seoj,
            deoj,
            esv,
            properties: Vec::new(),
        }
    }

    /// Create a Get request for the given property codes
    #[must_use]
    pub fn get_request(
        tid: TransactionId,
        seoj: EchonetObject,
        deoj: EchonetObject,
        epcs: &[u8],
    ) -> Self {
        let mut frame = Self::new(tid, seoj, deoj, Esv::Get);
        frame.properties = epcs.iter().map(|&epc| RawProperty::request(epc)).collect();
        frame
    }

    /// Append a property
    #[must_use]
    pub fn with_property(mut self, property: impl Into<RawProperty>) -> Self {
        self.properties.push(property.into());
        self
    }

    /// Encode to wire bytes
    ///
    /// # Returns
    ///
    /// The encoded frame, or `InvalidPacket` if the frame holds more than 255
    /// properties or a property value longer than 255 bytes
    pub fn encode(&self) -> RouteBResult<Vec<u8>> {
        let opc = u8::try_from(self.properties.len()).map_err(|_| {
            RouteBError::InvalidPacket(format!(
                "Too many properties: {}",
                self.properties.len()
            ))
        })?;

        let body_len: usize = self.properties.iter().map(|p| 2 + p.edt.len()).sum();
        let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);

        buf.put_u8(EHD1_ECHONET_LITE);
        buf.put_u8(EHD2_SPECIFIED_FORMAT);
        buf.put_u16(self.tid.0);
        buf.put_slice(&self.seoj.0);
        buf.put_slice(&self.deoj.0);
        buf.put_u8(self.esv.as_u8());
        buf.put_u8(opc);

        for property in &self.properties {
            let pdc = u8::try_from(property.edt.len()).map_err(|_| {
                RouteBError::InvalidPacket(format!(
                    "EPC 0x{:02X}: property data too long ({} bytes)",
                    property.epc,
                    property.edt.len()
                ))
            })?;
            buf.put_u8(property.epc);
            buf.put_u8(pdc);
            buf.put_slice(&property.edt);
        }

        Ok(buf.to_vec())
    }

    /// Decode from wire bytes
    ///
    /// # Returns
    ///
    /// The decoded frame, or `InvalidPacket` if the frame is shorter than the
    /// fixed header, carries an unexpected EHD1/EHD2, declares a PDC that runs
    /// past the end of the data, or has a triplet count different from OPC
    pub fn decode(data: &[u8]) -> RouteBResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(RouteBError::InvalidPacket(format!(
                "Frame too short: {} bytes",
                data.len()
            )));
        }
        if data[0] != EHD1_ECHONET_LITE || data[1] != EHD2_SPECIFIED_FORMAT {
            return Err(RouteBError::InvalidPacket(format!(
                "Unexpected header: {:02X} {:02X}",
                data[0], data[1]
            )));
        }

        let mut cursor = &data[2..];
        let tid = TransactionId(cursor.get_u16());
        let seoj = EchonetObject([cursor.get_u8(), cursor.get_u8(), cursor.get_u8()]);
        let deoj = EchonetObject([cursor.get_u8(), cursor.get_u8(), cursor.get_u8()]);
        let esv = Esv::from_u8(cursor.get_u8());
        let opc = cursor.get_u8();

        let mut properties = Vec::with_capacity(usize::from(opc));
        while cursor.has_remaining() {
            if cursor.remaining() < 2 {
                return Err(RouteBError::InvalidPacket(
                    "Truncated property header".to_string(),
                ));
            }
            let epc = cursor.get_u8();
            let pdc = usize::from(cursor.get_u8());
            if cursor.remaining() < pdc {
                return Err(RouteBError::InvalidPacket(format!(
                    "EPC 0x{:02X}: PDC {} overruns frame ({} bytes left)",
                    epc,
                    pdc,
                    cursor.remaining()
                )));
            }
            properties.push(RawProperty::new(epc, cursor[..pdc].to_vec()));
            cursor.advance(pdc);
        }

        if properties.len() != usize::from(opc) {
            return Err(RouteBError::InvalidPacket(format!(
                "OPC {} does not match property count {}",
                opc,
                properties.len()
            )));
        }

        Ok(Self {
            tid,
            seoj,
            deoj,
            esv,
            properties,
        })
    }

    /// Decode the properties through the registry, keyed by SEOJ
    pub fn interpret(&self, registry: &PropertyRegistry) -> Vec<Property> {
        self.properties
            .iter()
            .map(|raw| registry.decode(self.seoj, raw))
            .collect()
    }

    /// Whether `other` belongs to the same transaction
    pub fn is_pair(&self, other: &EchonetFrame) -> bool {
        self.tid == other.tid
    }

    /// Instantaneous power in watts from a Get_Res carrying only EPC 0xE7
    pub fn instantaneous_power(&self) -> RouteBResult<i32> {
        if self.esv != Esv::GetRes {
            return Err(RouteBError::InvalidPacket(format!(
                "Expected Get_Res, got ESV 0x{:02X}",
                self.esv.as_u8()
            )));
        }
        let [property] = self.properties.as_slice() else {
            return Err(RouteBError::InvalidPacket(format!(
                "Expected one property, got {}",
                self.properties.len()
            )));
        };
        property.expect_epc(crate::smart_meter::EPC_INSTANTANEOUS_POWER)?;
        property.expect_len(4)?;
        Ok(i32::from_be_bytes([
            property.edt[0],
            property.edt[1],
            property.edt[2],
            property.edt[3],
        ]))
    }
}
