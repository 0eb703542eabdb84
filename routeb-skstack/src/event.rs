//! SKSTACK event decoder
//!
//! Events are classified by the first whitespace-separated token of a line.
//! Most events fit on one line; a few span several lines and end at a
//! sentinel:
//!
//! | identifier | lines | sentinel |
//! |---|---|---|
//! | `EADDR`, `ENEIGHBOR`, `EPORT`, `EHANDLE` | header + body | `OK` |
//! | `EPANDESC`, `EEDSCAN` | header + body | blank line or end of block |
//!
//! A malformed event is logged and skipped; the rest of the block is still
//! decoded.

use routeb_core::hex;
use routeb_core::{RouteBError, RouteBResult};

pub const ERXUDP: &str = "ERXUDP";
pub const ERXDATA: &str = "ERXDATA";
pub const EPONG: &str = "EPONG";
pub const ETCP: &str = "ETCP";
pub const EADDR: &str = "EADDR";
pub const ENEIGHBOR: &str = "ENEIGHBOR";
pub const EPANDESC: &str = "EPANDESC";
pub const EEDSCAN: &str = "EEDSCAN";
pub const EPORT: &str = "EPORT";
pub const EHANDLE: &str = "EHANDLE";
pub const EVENT: &str = "EVENT";
pub const ESREG: &str = "ESREG";
pub const EINFO: &str = "EINFO";
pub const EVER: &str = "EVER";
pub const EAPPVER: &str = "EAPPVER";

const OK_SENTINEL: &str = "OK";

/// Code of a numbered `EVENT` notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCode {
    /// 0x01 Neighbor Solicitation received
    NsReceived,
    /// 0x02 Neighbor Advertisement received
    NaReceived,
    /// 0x05 Echo Request received
    EchoRequestReceived,
    /// 0x1F ED scan finished
    EdScanDone,
    /// 0x20 Beacon received
    BeaconReceived,
    /// 0x21 UDP transmission finished
    UdpSent,
    /// 0x22 Active scan finished
    ActiveScanDone,
    /// 0x24 PANA connection failed
    PanaConnectFailed,
    /// 0x25 PANA connection established
    PanaConnected,
    /// 0x26 Session close request received
    SessionCloseRequested,
    /// 0x27 PANA session closed
    PanaSessionClosed,
    /// 0x28 No response to the session close request
    PanaCloseTimeout,
    /// 0x29 PANA session lifetime expired
    PanaSessionExpired,
    /// 0x32 Transmission rate limit exceeded
    RateLimitExceeded,
    /// 0x33 Transmission rate limit released
    RateLimitReleased,
    Other(u8),
}

impl EventCode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => EventCode::NsReceived,
            0x02 => EventCode::NaReceived,
            0x05 => EventCode::EchoRequestReceived,
            0x1F => EventCode::EdScanDone,
            0x20 => EventCode::BeaconReceived,
            0x21 => EventCode::UdpSent,
            0x22 => EventCode::ActiveScanDone,
            0x24 => EventCode::PanaConnectFailed,
            0x25 => EventCode::PanaConnected,
            0x26 => EventCode::SessionCloseRequested,
            0x27 => EventCode::PanaSessionClosed,
            0x28 => EventCode::PanaCloseTimeout,
            0x29 => EventCode::PanaSessionExpired,
            0x32 => EventCode::RateLimitExceeded,
            0x33 => EventCode::RateLimitReleased,
            other => EventCode::Other(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            EventCode::NsReceived => 0x01,
            EventCode::NaReceived => 0x02,
            EventCode::EchoRequestReceived => 0x05,
            EventCode::EdScanDone => 0x1F,
            EventCode::BeaconReceived => 0x20,
            EventCode::UdpSent => 0x21,
            EventCode::ActiveScanDone => 0x22,
            EventCode::PanaConnectFailed => 0x24,
            EventCode::PanaConnected => 0x25,
            EventCode::SessionCloseRequested => 0x26,
            EventCode::PanaSessionClosed => 0x27,
            EventCode::PanaCloseTimeout => 0x28,
            EventCode::PanaSessionExpired => 0x29,
            EventCode::RateLimitExceeded => 0x32,
            EventCode::RateLimitReleased => 0x33,
            EventCode::Other(value) => *value,
        }
    }

    /// Line prefix of this event, e.g. `EVENT 25`
    pub fn line_prefix(&self) -> String {
        format!("{} {:02X}", EVENT, self.as_u8())
    }
}

/// `ERXUDP`: UDP datagram received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpReceived {
    pub sender: String,
    pub destination: String,
    pub remote_port: u16,
    pub local_port: u16,
    /// Link-layer address of the sender
    pub sender_lla: u64,
    pub secured: bool,
    /// Present on firmware that prints the reserved column
    pub reserved: Option<u8>,
    pub data: Vec<u8>,
}

/// `ERXDATA`: TCP data received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpReceived {
    pub sender: String,
    pub remote_port: u16,
    pub local_port: u16,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpStatus {
    Connected,
    Closed,
    SourcePortInUse,
    DataSent,
    Other(u8),
}

impl TcpStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0x01 => TcpStatus::Connected,
            0x03 => TcpStatus::Closed,
            0x04 => TcpStatus::SourcePortInUse,
            0x05 => TcpStatus::DataSent,
            other => TcpStatus::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConnection {
    pub handle: u8,
    pub address: String,
    pub remote_port: u16,
    pub local_port: u16,
}

/// `ETCP`: TCP connection state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpStateChange {
    pub status: TcpStatus,
    /// Connection details, reported with `Connected`
    pub connection: Option<TcpConnection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub address: String,
    pub mac: u64,
    pub short_address: u16,
}

/// `EPANDESC`: PAN found by an active scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanDescriptor {
    pub channel: u8,
    pub channel_page: u8,
    pub pan_id: u16,
    pub mac: u64,
    pub lqi: u8,
    pub side: Option<u8>,
    pub pair_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyScanResult {
    pub channel: u8,
    pub rssi: u8,
}

/// `EPORT`: listening ports, zero entries omitted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortList {
    pub udp: Vec<u16>,
    pub tcp: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHandle {
    pub handle: u8,
    pub address: String,
    pub remote_port: u16,
    pub local_port: u16,
}

/// `EVENT`: numbered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberedEvent {
    pub code: EventCode,
    pub sender: String,
    pub param: Option<u8>,
    pub payload: Option<String>,
}

/// `EINFO`: current communication settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub address: String,
    pub mac: u64,
    pub channel: u8,
    pub pan_id: u16,
    pub short_address: u16,
}

/// Device notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    UdpReceived(UdpReceived),
    TcpReceived(TcpReceived),
    Pong { sender: String },
    TcpState(TcpStateChange),
    Addresses(Vec<String>),
    Neighbors(Vec<Neighbor>),
    PanDescriptor(PanDescriptor),
    EnergyScan(Vec<EnergyScanResult>),
    Ports(PortList),
    Handles(Vec<TcpHandle>),
    Numbered(NumberedEvent),
    Register(String),
    Info(NodeInfo),
    Version(String),
    AppVersion(String),
}

impl Event {
    /// Wire identifier of the variant
    pub fn identifier(&self) -> &'static str {
        match self {
            Event::UdpReceived(_) => ERXUDP,
            Event::TcpReceived(_) => ERXDATA,
            Event::Pong { .. } => EPONG,
            Event::TcpState(_) => ETCP,
            Event::Addresses(_) => EADDR,
            Event::Neighbors(_) => ENEIGHBOR,
            Event::PanDescriptor(_) => EPANDESC,
            Event::EnergyScan(_) => EEDSCAN,
            Event::Ports(_) => EPORT,
            Event::Handles(_) => EHANDLE,
            Event::Numbered(_) => EVENT,
            Event::Register(_) => ESREG,
            Event::Info(_) => EINFO,
            Event::Version(_) => EVER,
            Event::AppVersion(_) => EAPPVER,
        }
    }

    /// Event code if this is a numbered event
    pub fn code(&self) -> Option<EventCode> {
        match self {
            Event::Numbered(event) => Some(event.code),
            _ => None,
        }
    }
}

enum Sentinel {
    Ok,
    Blank,
}

/// Decode every event found in `lines`, in line order
pub fn decode_events(lines: &[String]) -> Vec<Event> {
    let mut events = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        let Some(identifier) = line.split_whitespace().next() else {
            i += 1;
            continue;
        };

        let sentinel = match identifier {
            EADDR | ENEIGHBOR | EPORT | EHANDLE => Some(Sentinel::Ok),
            EPANDESC | EEDSCAN => Some(Sentinel::Blank),
            _ => None,
        };

        let (unit, next) = match sentinel {
            None => (&lines[i..=i], i + 1),
            Some(Sentinel::Ok) => {
                match lines[i + 1..].iter().position(|l| l.trim_end() == OK_SENTINEL) {
                    Some(offset) => (&lines[i..i + 1 + offset], i + 2 + offset),
                    None => {
                        log::debug!("{} without OK sentinel, skipping header", identifier);
                        i += 1;
                        continue;
                    }
                }
            }
            Some(Sentinel::Blank) => {
                match lines[i + 1..].iter().position(|l| l.trim().is_empty()) {
                    Some(offset) => (&lines[i..i + 1 + offset], i + 2 + offset),
                    None => (&lines[i..], lines.len()),
                }
            }
        };

        match decode_unit(identifier, unit) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => log::trace!("Ignoring line: {}", line.escape_debug()),
            Err(e) => log::warn!("Skipping malformed {}: {}", identifier, e),
        }
        i = next;
    }

    events
}

/// Decode one classified unit; `Ok(None)` for lines that are not events
fn decode_unit(identifier: &str, unit: &[String]) -> RouteBResult<Option<Event>> {
    let header = &unit[0];
    let fields: Vec<&str> = header.split_whitespace().skip(1).collect();
    let body = &unit[1..];

    let event = match identifier {
        ERXUDP => Event::UdpReceived(decode_erxudp(&fields)?),
        ERXDATA => Event::TcpReceived(decode_erxdata(&fields)?),
        EPONG => Event::Pong {
            sender: single_field(&fields, EPONG)?.to_string(),
        },
        ETCP => Event::TcpState(decode_etcp(&fields)?),
        EADDR => Event::Addresses(
            body.iter()
                .map(|l| l.trim())
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        ENEIGHBOR => Event::Neighbors(decode_neighbors(body)?),
        EPANDESC => Event::PanDescriptor(decode_epandesc(body)?),
        EEDSCAN => Event::EnergyScan(decode_eedscan(body)?),
        EPORT => Event::Ports(decode_eport(body)?),
        EHANDLE => Event::Handles(decode_handles(body)?),
        EVENT => Event::Numbered(decode_numbered(&fields)?),
        ESREG => Event::Register(single_field(&fields, ESREG)?.to_string()),
        EINFO => Event::Info(decode_einfo(&fields)?),
        EVER => Event::Version(rest_of_line(header, EVER)?),
        EAPPVER => Event::AppVersion(rest_of_line(header, EAPPVER)?),
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn invalid(message: impl Into<String>) -> RouteBError {
    RouteBError::InvalidEvent(message.into())
}

fn expect_fields(fields: &[&str], count: usize, identifier: &str) -> RouteBResult<()> {
    if fields.len() != count {
        return Err(invalid(format!(
            "{} expects {} fields, got {}",
            identifier,
            count,
            fields.len()
        )));
    }
    Ok(())
}

fn single_field<'a>(fields: &[&'a str], identifier: &str) -> RouteBResult<&'a str> {
    expect_fields(fields, 1, identifier)?;
    Ok(fields[0])
}

fn rest_of_line(header: &str, identifier: &str) -> RouteBResult<String> {
    let rest = header[identifier.len()..].trim();
    if rest.is_empty() {
        return Err(invalid(format!("{} without value", identifier)));
    }
    Ok(rest.to_string())
}

fn decode_erxudp(fields: &[&str]) -> RouteBResult<UdpReceived> {
    let (reserved, length, data) = match fields.len() {
        9 => (Some(hex::parse_flag(fields[6])?), fields[7], fields[8]),
        8 => (None, fields[6], fields[7]),
        n => return Err(invalid(format!("ERXUDP expects 8 or 9 fields, got {}", n))),
    };

    let data = hex::decode_bytes(data)?;
    let length = hex::parse_u16(length)?;
    if usize::from(length) != data.len() {
        return Err(invalid(format!(
            "ERXUDP declares {} bytes, carries {}",
            length,
            data.len()
        )));
    }

    Ok(UdpReceived {
        sender: fields[0].to_string(),
        destination: fields[1].to_string(),
        remote_port: hex::parse_u16(fields[2])?,
        local_port: hex::parse_u16(fields[3])?,
        sender_lla: hex::parse_u64(fields[4])?,
        secured: hex::parse_bool(fields[5])?,
        reserved,
        data,
    })
}

fn decode_erxdata(fields: &[&str]) -> RouteBResult<TcpReceived> {
    expect_fields(fields, 4, ERXDATA)?;
    Ok(TcpReceived {
        sender: fields[0].to_string(),
        remote_port: hex::parse_u16(fields[1])?,
        local_port: hex::parse_u16(fields[2])?,
        data: hex::decode_bytes(fields[3])?,
    })
}

fn decode_etcp(fields: &[&str]) -> RouteBResult<TcpStateChange> {
    let Some(status) = fields.first() else {
        return Err(invalid("ETCP without status"));
    };
    let status = TcpStatus::from_u8(hex::parse_u8(status)?);

    let connection = if status == TcpStatus::Connected {
        expect_fields(fields, 5, ETCP)?;
        Some(TcpConnection {
            handle: hex::parse_flag(fields[1])?,
            address: fields[2].to_string(),
            remote_port: hex::parse_u16(fields[3])?,
            local_port: hex::parse_u16(fields[4])?,
        })
    } else {
        None
    };

    Ok(TcpStateChange { status, connection })
}

fn decode_neighbors(body: &[String]) -> RouteBResult<Vec<Neighbor>> {
    body.iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            expect_fields(&fields, 3, ENEIGHBOR)?;
            Ok(Neighbor {
                address: fields[0].to_string(),
                mac: hex::parse_u64(fields[1])?,
                short_address: hex::parse_u16(fields[2])?,
            })
        })
        .collect()
}

fn decode_epandesc(body: &[String]) -> RouteBResult<PanDescriptor> {
    let mut channel = None;
    let mut channel_page = None;
    let mut pan_id = None;
    let mut mac = None;
    let mut lqi = None;
    let mut side = None;
    let mut pair_id = None;

    for line in body {
        let Some((key, value)) = line.split_once(':') else {
            return Err(invalid(format!("EPANDESC line without key: {:?}", line)));
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "channel" => channel = Some(hex::parse_u8(value)?),
            "channel page" => channel_page = Some(hex::parse_u8(value)?),
            "pan id" => pan_id = Some(hex::parse_u16(value)?),
            "addr" => mac = Some(hex::parse_u64(value)?),
            "lqi" => lqi = Some(hex::parse_u8(value)?),
            "side" => side = Some(hex::parse_flag(value)?),
            "pairid" => pair_id = Some(hex::parse_u32(value)?),
            other => log::debug!("Ignoring EPANDESC field {:?}", other),
        }
    }

    let missing = |name: &str| invalid(format!("EPANDESC without {}", name));
    Ok(PanDescriptor {
        channel: channel.ok_or_else(|| missing("Channel"))?,
        channel_page: channel_page.ok_or_else(|| missing("Channel Page"))?,
        pan_id: pan_id.ok_or_else(|| missing("Pan ID"))?,
        mac: mac.ok_or_else(|| missing("Addr"))?,
        lqi: lqi.ok_or_else(|| missing("LQI"))?,
        side,
        pair_id: pair_id.ok_or_else(|| missing("PairID"))?,
    })
}

fn decode_eedscan(body: &[String]) -> RouteBResult<Vec<EnergyScanResult>> {
    let fields: Vec<&str> = body.iter().flat_map(|l| l.split_whitespace()).collect();
    if fields.len() % 2 != 0 {
        return Err(invalid("EEDSCAN with unpaired channel/RSSI"));
    }
    fields
        .chunks_exact(2)
        .map(|pair| {
            Ok(EnergyScanResult {
                channel: hex::parse_u8(pair[0])?,
                rssi: hex::parse_u8(pair[1])?,
            })
        })
        .collect()
}

fn decode_eport(body: &[String]) -> RouteBResult<PortList> {
    let mut ports = PortList::default();
    let mut tcp_section = false;

    for line in body {
        let line = line.trim();
        if line.is_empty() {
            tcp_section = true;
            continue;
        }
        let port: u16 = line
            .parse()
            .map_err(|_| invalid(format!("Invalid EPORT entry {:?}", line)))?;
        if port == 0 {
            continue;
        }
        if tcp_section {
            ports.tcp.push(port);
        } else {
            ports.udp.push(port);
        }
    }

    Ok(ports)
}

fn decode_handles(body: &[String]) -> RouteBResult<Vec<TcpHandle>> {
    body.iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            expect_fields(&fields, 4, EHANDLE)?;
            Ok(TcpHandle {
                handle: hex::parse_flag(fields[0])?,
                address: fields[1].to_string(),
                remote_port: hex::parse_u16(fields[2])?,
                local_port: hex::parse_u16(fields[3])?,
            })
        })
        .collect()
}

fn decode_numbered(fields: &[&str]) -> RouteBResult<NumberedEvent> {
    if !(2..=4).contains(&fields.len()) {
        return Err(invalid(format!(
            "EVENT expects 2 to 4 fields, got {}",
            fields.len()
        )));
    }
    Ok(NumberedEvent {
        code: EventCode::from_u8(hex::parse_u8(fields[0])?),
        sender: fields[1].to_string(),
        param: fields.get(2).map(|p| hex::parse_u8(p)).transpose()?,
        payload: fields.get(3).map(|p| p.to_string()),
    })
}

fn decode_einfo(fields: &[&str]) -> RouteBResult<NodeInfo> {
    expect_fields(fields, 5, EINFO)?;
    Ok(NodeInfo {
        address: fields[0].to_string(),
        mac: hex::parse_u64(fields[1])?,
        channel: hex::parse_u8(fields[2])?,
        pan_id: hex::parse_u16(fields[3])?,
        short_address: hex::parse_u16(fields[4])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|l| l.to_string()).collect()
    }

    const METER: &str = "FE80:0000:0000:0000:021D:1290:1234:5678";
    const LOCAL: &str = "FE80:0000:0000:0000:021D:1290:0003:C890";

    #[test]
    fn test_erxudp() {
        let line = format!(
            "ERXUDP {} {} 0E1A 0E1A 001D129012345678 1 0 0012 1081000102880105FF017201E7040000012C",
            METER, LOCAL
        );
        let events = decode_events(&[line]);
        let [Event::UdpReceived(rx)] = events.as_slice() else {
            panic!("unexpected events: {:?}", events);
        };
        assert_eq!(rx.sender, METER);
        assert_eq!(rx.destination, LOCAL);
        assert_eq!(rx.remote_port, 0x0E1A);
        assert_eq!(rx.sender_lla, 0x001D_1290_1234_5678);
        assert!(rx.secured);
        assert_eq!(rx.reserved, Some(0));
        assert_eq!(rx.data.len(), 0x12);
        assert_eq!(&rx.data[rx.data.len() - 4..], &[0x00, 0x00, 0x01, 0x2C]);
    }

    #[test]
    fn test_erxudp_without_reserved_column() {
        let line = format!("ERXUDP {} {} 0E1A 0E1A 001D129012345678 1 0002 ABCD", METER, LOCAL);
        let events = decode_events(&[line]);
        assert!(matches!(
            events.as_slice(),
            [Event::UdpReceived(UdpReceived { reserved: None, .. })]
        ));
    }

    #[test]
    fn test_malformed_event_does_not_abort_block() {
        let block = lines(&[
            "ERXUDP FE80::1 FE80::2 E1A 0E1A 001D129012345678 1 0 0002 ABCD",
            "EVENT 21 FE80::1 00",
            "ERXUDP FE80::1 FE80::2 0E1A 0E1A 001D129012345678 yes 0 0002 ABCD",
            "EVENT 25 FE80::1",
        ]);
        let events = decode_events(&block);
        let codes: Vec<_> = events.iter().filter_map(Event::code).collect();
        assert_eq!(codes, vec![EventCode::UdpSent, EventCode::PanaConnected]);
    }

    #[test]
    fn test_numbered_event() {
        let events = decode_events(&lines(&[&format!("EVENT 21 {} 00", METER)]));
        assert_eq!(
            events,
            vec![Event::Numbered(NumberedEvent {
                code: EventCode::UdpSent,
                sender: METER.to_string(),
                param: Some(0),
                payload: None,
            })]
        );
        assert_eq!(EventCode::PanaConnected.line_prefix(), "EVENT 25");
    }

    #[test]
    fn test_single_line_events() {
        let block = lines(&[
            "SKINFO",
            &format!("EINFO {} 001D129012345678 21 8888 FFFE", LOCAL),
            "EVER 1.2.10",
            "EAPPVER rev26e",
            "ESREG 21",
            &format!("EPONG {}", METER),
            &format!("ETCP 01 1 {} 0E1A 0E1B", METER),
            "ETCP 03",
            "OK",
        ]);
        let events = decode_events(&block);
        assert_eq!(events.len(), 7);
        assert_eq!(
            events[0],
            Event::Info(NodeInfo {
                address: LOCAL.to_string(),
                mac: 0x001D_1290_1234_5678,
                channel: 0x21,
                pan_id: 0x8888,
                short_address: 0xFFFE,
            })
        );
        assert_eq!(events[1], Event::Version("1.2.10".to_string()));
        assert_eq!(events[2], Event::AppVersion("rev26e".to_string()));
        assert_eq!(events[3], Event::Register("21".to_string()));
        assert_eq!(events[4].identifier(), EPONG);
        let Event::TcpState(connected) = &events[5] else {
            panic!("expected ETCP");
        };
        assert_eq!(connected.connection.as_ref().unwrap().local_port, 0x0E1B);
        assert_eq!(
            events[6],
            Event::TcpState(TcpStateChange {
                status: TcpStatus::Closed,
                connection: None,
            })
        );
    }

    #[test]
    fn test_eaddr_and_eport() {
        let block = lines(&[
            "SKTABLE 1",
            "EADDR",
            LOCAL,
            "OK",
            "EPORT",
            "3610",
            "0",
            "0",
            "",
            "0",
            "OK",
        ]);
        let events = decode_events(&block);
        assert_eq!(
            events,
            vec![
                Event::Addresses(vec![LOCAL.to_string()]),
                Event::Ports(PortList {
                    udp: vec![3610],
                    tcp: vec![],
                }),
            ]
        );
    }

    #[test]
    fn test_ok_sentinel_missing() {
        let events = decode_events(&lines(&["EADDR", LOCAL, "EVER 1.2.10"]));
        assert_eq!(events, vec![Event::Version("1.2.10".to_string())]);
    }

    #[test]
    fn test_epandesc_and_eedscan() {
        let block = lines(&[
            "EVENT 20 FE80:0000:0000:0000:021D:1290:1234:5678",
            "EPANDESC",
            "  Channel:21",
            "  Channel Page:09",
            "  Pan ID:8888",
            "  Addr:001D129012345678",
            "  LQI:E1",
            "  Side:0",
            "  PairID:00ABCDEF",
            "",
            "EEDSCAN",
            "21 2C 22 2D 23 FF",
        ]);
        let events = decode_events(&block);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[1],
            Event::PanDescriptor(PanDescriptor {
                channel: 0x21,
                channel_page: 0x09,
                pan_id: 0x8888,
                mac: 0x001D_1290_1234_5678,
                lqi: 0xE1,
                side: Some(0),
                pair_id: 0x00AB_CDEF,
            })
        );
        // EEDSCAN ends at the end of the block
        assert_eq!(
            events[2],
            Event::EnergyScan(vec![
                EnergyScanResult { channel: 0x21, rssi: 0x2C },
                EnergyScanResult { channel: 0x22, rssi: 0x2D },
                EnergyScanResult { channel: 0x23, rssi: 0xFF },
            ])
        );
    }

    #[test]
    fn test_neighbors_and_handles() {
        let block = lines(&[
            "ENEIGHBOR",
            &format!("{} 001D129012345678 FFFF", METER),
            "OK",
            "EHANDLE",
            &format!("1 {} 0E1A 0E1B", METER),
            "OK",
        ]);
        let events = decode_events(&block);
        assert_eq!(events.len(), 2);
        let Event::Neighbors(neighbors) = &events[0] else {
            panic!("expected ENEIGHBOR");
        };
        assert_eq!(neighbors[0].short_address, 0xFFFF);
        let Event::Handles(handles) = &events[1] else {
            panic!("expected EHANDLE");
        };
        assert_eq!(handles[0].handle, 1);
        assert_eq!(handles[0].remote_port, 0x0E1A);
    }

    #[test]
    fn test_strict_field_widths() {
        // Channel must be two digits
        let events = decode_events(&lines(&[&format!(
            "EINFO {} 001D129012345678 1 8888 FFFE",
            LOCAL
        )]));
        assert!(events.is_empty());
    }
}
