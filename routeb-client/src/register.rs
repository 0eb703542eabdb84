//! SKSTACK virtual registers

use std::fmt;

/// Virtual register addressed by `SKSREG`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// S02: logical channel number (0x21 - 0x3C), saved
    Channel,
    /// S03: PAN ID, saved
    PanId,
    /// S07: MAC frame counter, read only
    FrameCounter,
    /// S0A: pairing ID, 8 ASCII characters
    PairingId,
    /// S15: respond to beacon requests
    RespondBeaconRequest,
    /// S16: PANA session lifetime in seconds
    PanaSessionLifetime,
    /// S17: automatic re-authentication
    AutoReauthentication,
    /// SA0: encrypt MAC broadcasts
    EncryptBroadcast,
    /// SA1: accept plain ICMP messages
    PlainIcmpAccept,
    /// SFB: transmission rate limit in effect, read only
    RateLimitExceeded,
    /// SFD: accumulated transmission time in ms, only 0 may be written
    TransmissionTime,
    /// SFE: echo back commands
    Echoback,
    /// SFF: load saved registers at start-up
    Autoload,
}

impl Register {
    pub fn as_u8(&self) -> u8 {
        match self {
            Register::Channel => 0x02,
            Register::PanId => 0x03,
            Register::FrameCounter => 0x07,
            Register::PairingId => 0x0A,
            Register::RespondBeaconRequest => 0x15,
            Register::PanaSessionLifetime => 0x16,
            Register::AutoReauthentication => 0x17,
            Register::EncryptBroadcast => 0xA0,
            Register::PlainIcmpAccept => 0xA1,
            Register::RateLimitExceeded => 0xFB,
            Register::TransmissionTime => 0xFD,
            Register::Echoback => 0xFE,
            Register::Autoload => 0xFF,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x02 => Some(Register::Channel),
            0x03 => Some(Register::PanId),
            0x07 => Some(Register::FrameCounter),
            0x0A => Some(Register::PairingId),
            0x15 => Some(Register::RespondBeaconRequest),
            0x16 => Some(Register::PanaSessionLifetime),
            0x17 => Some(Register::AutoReauthentication),
            0xA0 => Some(Register::EncryptBroadcast),
            0xA1 => Some(Register::PlainIcmpAccept),
            0xFB => Some(Register::RateLimitExceeded),
            0xFD => Some(Register::TransmissionTime),
            0xFE => Some(Register::Echoback),
            0xFF => Some(Register::Autoload),
            _ => None,
        }
    }

    /// Whether the value survives `SKSAVE`
    pub fn is_saved(&self) -> bool {
        matches!(
            self,
            Register::Channel | Register::PanId | Register::Autoload
        )
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02X}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_names() {
        assert_eq!(Register::Channel.to_string(), "S02");
        assert_eq!(Register::PairingId.to_string(), "S0A");
        assert_eq!(Register::EncryptBroadcast.to_string(), "SA0");
        assert_eq!(Register::Autoload.to_string(), "SFF");
    }

    #[test]
    fn test_register_codes() {
        for code in 0..=u8::MAX {
            if let Some(register) = Register::from_u8(code) {
                assert_eq!(register.as_u8(), code);
            }
        }
        assert_eq!(Register::from_u8(0x04), None);
        assert!(Register::PanId.is_saved());
        assert!(!Register::FrameCounter.is_saved());
    }
}
