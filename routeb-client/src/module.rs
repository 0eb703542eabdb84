//! MB-RL7023-11 command wrappers
//!
//! Every SKSTACK command is one method that formats the command line, runs
//! it through the `CommandExecutor` and unwraps the event the command is
//! expected to produce.
//!
//! # Command Completion
//!
//! Most commands end with the blank block that follows their `OK`. Commands
//! whose result arrives later wait for a specific line instead:
//!
//! | command | completes on |
//! |---|---|
//! | `SKJOIN`, `SKREJOIN` | `EVENT 24` or `EVENT 25` |
//! | `SKTERM` | `EVENT 27` or `EVENT 28` |
//! | `SKSENDTO` | the correlated `ERXUDP` |
//! | `SKSEND` | `ETCP` |
//! | `SKPING` | `EPONG` |
//! | `SKSCAN` | `EVENT 22` or `EEDSCAN` |

use routeb_core::{RouteBError, RouteBResult};
use routeb_echonet::EchonetFrame;
use routeb_skstack::event::{
    EnergyScanResult, Neighbor, NodeInfo, PanDescriptor, PortList, TcpHandle, TcpStateChange,
    UdpReceived, EEDSCAN, EPONG, ETCP,
};
use routeb_skstack::{
    decode_events, CommandExecutor, CommandRequest, CommandResponse, Event, EventCode,
    LineBlock, LocalBindings, PendingReply, StreamMultiplexer,
};
use routeb_transport::StreamAccessor;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use crate::register::Register;

/// Pause after the wake-up CRLF so its echo does not end the next command
const WAKE_SETTLE: Duration = Duration::from_millis(100);

/// Encryption option of `SKSENDTO`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendSecurity {
    /// Always send in plain text
    Plain,
    /// Encrypt; drop the datagram if the peer is not registered as secure
    Strict,
    /// Encrypt if the peer is registered as secure, plain text otherwise
    Moderate,
}

impl SendSecurity {
    pub fn as_u8(&self) -> u8 {
        match self {
            SendSecurity::Plain => 0x00,
            SendSecurity::Strict => 0x01,
            SendSecurity::Moderate => 0x02,
        }
    }
}

/// Scan type of `SKSCAN`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    EnergyDetect,
    ActiveWithIe,
    ActiveWithoutIe,
}

impl ScanMode {
    pub fn as_u8(&self) -> u8 {
        match self {
            ScanMode::EnergyDetect => 0x00,
            ScanMode::ActiveWithIe => 0x02,
            ScanMode::ActiveWithoutIe => 0x03,
        }
    }
}

/// Table selected by `SKTABLE`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMode {
    AvailableAddresses,
    NeighborCache,
    ListeningPorts,
    TcpHandles,
}

impl TableMode {
    pub fn as_u8(&self) -> u8 {
        match self {
            TableMode::AvailableAddresses => 0x01,
            TableMode::NeighborCache => 0x02,
            TableMode::ListeningPorts => 0x0E,
            TableMode::TcpHandles => 0x0F,
        }
    }
}

/// Result of `SKSCAN`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    Pans(Vec<PanDescriptor>),
    EnergyDetect(Vec<EnergyScanResult>),
}

/// Correlated reply to `SKSENDTO`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpReply {
    pub reception: UdpReceived,
    pub frame: EchonetFrame,
}

fn unexpected(command: &str) -> RouteBError {
    RouteBError::UnexpectedOutput(format!("{} did not report its result", command))
}

/// Wi-SUN module driven through SKSTACK commands
pub struct WisunModule<T: StreamAccessor> {
    executor: CommandExecutor<T>,
    bindings: RwLock<LocalBindings>,
}

impl<T: StreamAccessor> std::fmt::Debug for WisunModule<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WisunModule")
            .field("executor", &self.executor)
            .field("bindings", &self.bindings())
            .finish()
    }
}

impl<T: StreamAccessor> WisunModule<T> {
    pub fn new(executor: CommandExecutor<T>) -> Self {
        Self {
            executor,
            bindings: RwLock::new(LocalBindings::default()),
        }
    }

    pub fn executor(&self) -> &CommandExecutor<T> {
        &self.executor
    }

    pub fn multiplexer(&self) -> &Arc<StreamMultiplexer<T>> {
        self.executor.multiplexer()
    }

    /// Local addresses and UDP ports found by `initialize`
    pub fn bindings(&self) -> LocalBindings {
        self.bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_bindings(&self, bindings: LocalBindings) {
        *self.bindings.write().unwrap_or_else(PoisonError::into_inner) = bindings;
    }

    async fn run(&self, request: CommandRequest) -> RouteBResult<CommandResponse> {
        self.executor.execute(request).await
    }

    async fn run_simple(&self, command: String) -> RouteBResult<()> {
        self.run(CommandRequest::new(command)).await.map(|_| ())
    }

    fn long_timeout(&self) -> Duration {
        self.executor.settings().long_timeout()
    }

    /// Reset the stack and learn the local addresses and UDP ports
    ///
    /// # Returns
    ///
    /// `AddressUnavailable` or `PortUnavailable` if the module reports no
    /// address or no listening UDP port
    pub async fn initialize(&self) -> RouteBResult<()> {
        self.multiplexer().write_all(b"\r\n").await?;
        tokio::time::sleep(WAKE_SETTLE).await;

        self.skreset().await?;

        let addresses = self.available_addresses().await?;
        if addresses.is_empty() {
            return Err(RouteBError::AddressUnavailable);
        }
        let ports = self.listening_ports().await?;
        if ports.udp.is_empty() {
            return Err(RouteBError::PortUnavailable);
        }

        log::info!(
            "Wi-SUN module ready: addresses {:?}, UDP ports {:?}",
            addresses,
            ports.udp
        );
        self.set_bindings(LocalBindings::new(addresses, ports.udp));
        Ok(())
    }

    /// Read or write a virtual register
    ///
    /// # Returns
    ///
    /// The register value when reading. A write usually reports nothing, in
    /// which case `None` is returned.
    pub async fn sksreg(&self, register: Register, value: Option<&str>) -> RouteBResult<Option<String>> {
        let command = match value {
            Some(value) => format!("SKSREG {} {}", register, value),
            None => format!("SKSREG {}", register),
        };
        let response = self.run(CommandRequest::new(command)).await?;
        let current = response.find_event(|event| match event {
            Event::Register(value) => Some(value.clone()),
            _ => None,
        });
        match (current, value) {
            (Some(current), _) => Ok(Some(current)),
            (None, Some(_)) => Ok(None),
            (None, None) => Err(unexpected("SKSREG")),
        }
    }

    pub async fn skinfo(&self) -> RouteBResult<NodeInfo> {
        self.run(CommandRequest::new("SKINFO"))
            .await?
            .find_event(|event| match event {
                Event::Info(info) => Some(info.clone()),
                _ => None,
            })
            .ok_or_else(|| unexpected("SKINFO"))
    }

    /// Start as PANA authentication server
    pub async fn skstart(&self) -> RouteBResult<()> {
        self.run_simple("SKSTART".to_string()).await
    }

    async fn pana_connect(&self, command: String) -> RouteBResult<()> {
        let request = CommandRequest::new(command.clone())
            .stop_on_prefixes([
                EventCode::PanaConnectFailed.line_prefix(),
                EventCode::PanaConnected.line_prefix(),
            ])
            .with_timeout(self.long_timeout());
        let response = self.run(request).await?;
        match response.find_event(|event| match event.code()? {
            code @ (EventCode::PanaConnectFailed | EventCode::PanaConnected) => Some(code),
            _ => None,
        }) {
            Some(EventCode::PanaConnected) => Ok(()),
            Some(_) => Err(RouteBError::FailedToConnect),
            None => Err(unexpected(&command)),
        }
    }

    /// Start the PANA connection sequence to `address` as client
    pub async fn skjoin(&self, address: &str) -> RouteBResult<()> {
        self.pana_connect(format!("SKJOIN {}", address)).await
    }

    /// Re-authenticate with the current peer
    pub async fn skrejoin(&self) -> RouteBResult<()> {
        self.pana_connect("SKREJOIN".to_string()).await
    }

    /// Close the current PANA session
    pub async fn skterm(&self) -> RouteBResult<()> {
        let request = CommandRequest::new("SKTERM")
            .stop_on_prefixes([
                EventCode::PanaSessionClosed.line_prefix(),
                EventCode::PanaCloseTimeout.line_prefix(),
            ])
            .with_timeout(self.long_timeout());
        let response = self.run(request).await?;
        match response.find_event(|event| match event.code()? {
            code @ (EventCode::PanaSessionClosed | EventCode::PanaCloseTimeout) => Some(code),
            _ => None,
        }) {
            Some(EventCode::PanaSessionClosed) => Ok(()),
            Some(_) => Err(RouteBError::FailedToConnect),
            None => Err(unexpected("SKTERM")),
        }
    }

    /// Send an ECHONET Lite frame over UDP and wait for its reply
    ///
    /// # Arguments
    ///
    /// * `handle` - UDP handle (1-based) the datagram leaves from
    /// * `address` - Destination IPv6 address
    /// * `port` - Destination port
    /// * `security` - Encryption option
    /// * `frame` - Frame to send; its TID identifies the reply
    ///
    /// # Returns
    ///
    /// The first `ERXUDP` whose addresses, ports and transaction id match
    /// the request
    pub async fn sksendto(
        &self,
        handle: u8,
        address: &str,
        port: u16,
        security: SendSecurity,
        frame: &EchonetFrame,
    ) -> RouteBResult<UdpReply> {
        let pending = PendingReply::new(&self.bindings(), handle, address, port, frame.tid)?;
        let payload = frame.encode()?;
        let command = format!(
            "SKSENDTO {:X} {} {:04X} {:X} {:X} {:04X} ",
            handle,
            address,
            port,
            security.as_u8(),
            0,
            payload.len()
        );

        let matched: Arc<Mutex<Option<UdpReply>>> = Arc::default();
        let request = CommandRequest::new(command)
            .with_payload(payload)
            .with_stopper({
                let matched = Arc::clone(&matched);
                move |block: &LineBlock| {
                    let mut matched = matched.lock().unwrap_or_else(PoisonError::into_inner);
                    if matched.is_none() {
                        *matched = decode_events(block.lines()).into_iter().find_map(|event| {
                            let Event::UdpReceived(reception) = event else {
                                return None;
                            };
                            let frame = pending.accept(&reception)?;
                            Some(UdpReply { reception, frame })
                        });
                    }
                    matched.is_some()
                }
            })
            .with_timeout(self.long_timeout());

        self.run(request).await?;
        let reply = matched.lock().unwrap_or_else(PoisonError::into_inner).take();
        reply.ok_or_else(|| unexpected("SKSENDTO"))
    }

    /// Send data over an established TCP connection
    pub async fn sksend(&self, handle: u8, data: &[u8]) -> RouteBResult<TcpStateChange> {
        let request = CommandRequest::new(format!("SKSEND {:X} {:04X} ", handle, data.len()))
            .with_payload(data)
            .stop_on_prefixes([ETCP])
            .with_timeout(self.long_timeout());
        self.run(request)
            .await?
            .find_event(|event| match event {
                Event::TcpState(state) => Some(state.clone()),
                _ => None,
            })
            .ok_or_else(|| unexpected("SKSEND"))
    }

    /// Send an ICMP echo request and wait for `EPONG`
    pub async fn skping(&self, address: &str) -> RouteBResult<()> {
        let request = CommandRequest::new(format!("SKPING {:X} {}", 0, address))
            .stop_on_prefixes([EPONG])
            .with_timeout(self.long_timeout());
        self.run(request).await.map(|_| ())
    }

    /// Run an active or energy-detect scan
    ///
    /// # Arguments
    ///
    /// * `mode` - Scan type
    /// * `channel_mask` - Bit mask of the channels to scan
    /// * `duration` - Per-channel scan duration exponent
    pub async fn skscan(&self, mode: ScanMode, channel_mask: u32, duration: u8) -> RouteBResult<ScanResult> {
        let command = format!(
            "SKSCAN {:X} {:08X} {:X} {:X}",
            mode.as_u8(),
            channel_mask,
            duration,
            0
        );
        let request = CommandRequest::new(command)
            .stop_on_prefixes([EventCode::ActiveScanDone.line_prefix(), EEDSCAN.to_string()])
            .with_timeout(self.executor.settings().scan_timeout);
        let response = self.run(request).await?;

        Ok(match mode {
            ScanMode::EnergyDetect => ScanResult::EnergyDetect(
                response
                    .events
                    .into_iter()
                    .filter_map(|event| match event {
                        Event::EnergyScan(results) => Some(results),
                        _ => None,
                    })
                    .flatten()
                    .collect(),
            ),
            ScanMode::ActiveWithIe | ScanMode::ActiveWithoutIe => ScanResult::Pans(
                response
                    .events
                    .into_iter()
                    .filter_map(|event| match event {
                        Event::PanDescriptor(pan) => Some(pan),
                        _ => None,
                    })
                    .collect(),
            ),
        })
    }

    /// Register an address for MAC layer security
    pub async fn skregdev(&self, address: &str) -> RouteBResult<()> {
        self.run_simple(format!("SKREGDEV {}", address)).await
    }

    /// Remove an address from the neighbor table and cache
    pub async fn skrmdev(&self, target: &str) -> RouteBResult<()> {
        self.run_simple(format!("SKRMDEV {}", target)).await
    }

    /// Register a 128-bit MAC layer key
    pub async fn sksetkey(&self, index: u8, key: &str) -> RouteBResult<()> {
        self.run_simple(format!("SKSETKEY {:X} {}", index, key)).await
    }

    pub async fn skrmkey(&self, index: u8) -> RouteBResult<()> {
        self.run_simple(format!("SKRMKEY {:X}", index)).await
    }

    /// Enable or disable MAC layer security for a peer
    pub async fn sksecenable(&self, enable: bool, address: &str, mac: u64) -> RouteBResult<()> {
        self.run_simple(format!(
            "SKSECENABLE {:X} {} {:016X}",
            u8::from(enable),
            address,
            mac
        ))
        .await
    }

    /// Register the PANA pre-shared key
    pub async fn sksetpsk(&self, psk: &str) -> RouteBResult<()> {
        self.run_simple(format!("SKSETPSK {:X} {}", psk.len(), psk)).await
    }

    /// Derive the PANA pre-shared key from the Route-B password
    pub async fn sksetpwd(&self, password: &str) -> RouteBResult<()> {
        self.run_simple(format!("SKSETPWD {:X} {}", password.len(), password))
            .await
    }

    /// Set the Route-B ID
    pub async fn sksetrbid(&self, id: &str) -> RouteBResult<()> {
        self.run_simple(format!("SKSETRBID {}", id)).await
    }

    /// Add a reachable neighbor cache entry
    pub async fn skaddnbr(&self, address: &str, mac: u64) -> RouteBResult<()> {
        self.run_simple(format!("SKADDNBR {} {:016X}", address, mac)).await
    }

    pub async fn skudpport(&self, handle: u8, port: u16) -> RouteBResult<()> {
        self.run_simple(format!("SKUDPPORT {:X} {:04X}", handle, port)).await
    }

    pub async fn sktcpport(&self, index: u8, port: u16) -> RouteBResult<()> {
        self.run_simple(format!("SKTCPPORT {:X} {:04X}", index, port)).await
    }

    /// Save the registers to non-volatile memory
    pub async fn sksave(&self) -> RouteBResult<()> {
        self.run_simple("SKSAVE".to_string()).await
    }

    pub async fn skload(&self) -> RouteBResult<()> {
        self.run_simple("SKLOAD".to_string()).await
    }

    pub async fn skerase(&self) -> RouteBResult<()> {
        self.run_simple("SKERASE".to_string()).await
    }

    /// Firmware version
    pub async fn skver(&self) -> RouteBResult<String> {
        self.run(CommandRequest::new("SKVER"))
            .await?
            .find_event(|event| match event {
                Event::Version(version) => Some(version.clone()),
                _ => None,
            })
            .ok_or_else(|| unexpected("SKVER"))
    }

    /// Reset the protocol stack
    pub async fn skreset(&self) -> RouteBResult<()> {
        self.run_simple("SKRESET".to_string()).await
    }

    /// Read one of the stack's tables
    ///
    /// # Returns
    ///
    /// The event that carries the table: `Addresses`, `Neighbors`, `Ports`
    /// or `Handles`
    pub async fn sktable(&self, mode: TableMode) -> RouteBResult<Event> {
        let response = self
            .run(CommandRequest::new(format!("SKTABLE {:X}", mode.as_u8())))
            .await?;
        response
            .events
            .into_iter()
            .find(|event| {
                matches!(
                    (mode, event),
                    (TableMode::AvailableAddresses, Event::Addresses(_))
                        | (TableMode::NeighborCache, Event::Neighbors(_))
                        | (TableMode::ListeningPorts, Event::Ports(_))
                        | (TableMode::TcpHandles, Event::Handles(_))
                )
            })
            .ok_or_else(|| unexpected("SKTABLE"))
    }

    pub async fn available_addresses(&self) -> RouteBResult<Vec<String>> {
        match self.sktable(TableMode::AvailableAddresses).await? {
            Event::Addresses(addresses) => Ok(addresses),
            _ => Err(unexpected("SKTABLE 1")),
        }
    }

    pub async fn neighbors(&self) -> RouteBResult<Vec<Neighbor>> {
        match self.sktable(TableMode::NeighborCache).await? {
            Event::Neighbors(neighbors) => Ok(neighbors),
            _ => Err(unexpected("SKTABLE 2")),
        }
    }

    pub async fn listening_ports(&self) -> RouteBResult<PortList> {
        match self.sktable(TableMode::ListeningPorts).await? {
            Event::Ports(ports) => Ok(ports),
            _ => Err(unexpected("SKTABLE E")),
        }
    }

    pub async fn tcp_handles(&self) -> RouteBResult<Vec<TcpHandle>> {
        match self.sktable(TableMode::TcpHandles).await? {
            Event::Handles(handles) => Ok(handles),
            _ => Err(unexpected("SKTABLE F")),
        }
    }

    /// Link-local IPv6 address derived from a MAC address
    pub async fn skll64(&self, mac: u64) -> RouteBResult<String> {
        let response = self
            .run(CommandRequest::new(format!("SKLL64 {:016X}", mac)))
            .await?;
        response
            .output
            .into_iter()
            .map(|line| line.trim().to_string())
            .find(|line| !line.is_empty())
            .ok_or_else(|| unexpected("SKLL64"))
    }

    pub async fn skconnect(&self, _address: &str, _remote_port: u16, _local_port: u16) -> RouteBResult<TcpStateChange> {
        Err(RouteBError::Unsupported("SKCONNECT"))
    }

    pub async fn skclose(&self, _handle: u8) -> RouteBResult<()> {
        Err(RouteBError::Unsupported("SKCLOSE"))
    }

    pub async fn skappver(&self) -> RouteBResult<String> {
        Err(RouteBError::Unsupported("SKAPPVER"))
    }

    pub async fn skdsleep(&self) -> RouteBResult<()> {
        Err(RouteBError::Unsupported("SKDSLEEP"))
    }

    pub async fn skrflo(&self, _mode: u8) -> RouteBResult<()> {
        Err(RouteBError::Unsupported("SKRFLO"))
    }

    pub async fn wopt(&self, _mode: u8) -> RouteBResult<()> {
        Err(RouteBError::Unsupported("WOPT"))
    }

    pub async fn ropt(&self) -> RouteBResult<u8> {
        Err(RouteBError::Unsupported("ROPT"))
    }

    pub async fn wuart(&self, _mode: u8) -> RouteBResult<()> {
        Err(RouteBError::Unsupported("WUART"))
    }

    pub async fn ruart(&self) -> RouteBResult<u8> {
        Err(RouteBError::Unsupported("RUART"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{erxudp, exchange, play, start_module, LOCAL, METER};
    use routeb_echonet::{EchonetObject, Esv, RawProperty, TransactionId};
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_initialize_learns_bindings() {
        let (module, peer) = start_module().await;
        let device = play(
            peer,
            vec![
                exchange("\r\n", &[]),
                exchange("SKRESET\r\n", &[&["SKRESET", "OK"]]),
                exchange("SKTABLE 1\r\n", &[&["SKTABLE 1", "EADDR", LOCAL, "OK"]]),
                exchange(
                    "SKTABLE E\r\n",
                    &[&["SKTABLE E", "EPORT", "3610", "0", "", "0", "OK"]],
                ),
            ],
        );

        assert_ok!(module.initialize().await);
        let bindings = module.bindings();
        assert_eq!(bindings.addresses, vec![LOCAL.to_string()]);
        assert_eq!(bindings.local_port(1), Some(0x0E1A));
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_requires_udp_port() {
        let (module, peer) = start_module().await;
        let device = play(
            peer,
            vec![
                exchange("\r\n", &[]),
                exchange("SKRESET\r\n", &[&["SKRESET", "OK"]]),
                exchange("SKTABLE 1\r\n", &[&["SKTABLE 1", "EADDR", LOCAL, "OK"]]),
                exchange("SKTABLE E\r\n", &[&["SKTABLE E", "EPORT", "0", "", "OK"]]),
            ],
        );

        assert!(matches!(
            module.initialize().await,
            Err(RouteBError::PortUnavailable)
        ));
        assert!(module.bindings().is_empty());
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_sksreg_read_and_write() {
        let (module, peer) = start_module().await;
        let device = play(
            peer,
            vec![
                exchange("SKSREG S02\r\n", &[&["SKSREG S02", "ESREG 21", "OK"]]),
                exchange("SKSREG S03 8888\r\n", &[&["SKSREG S03 8888", "OK"]]),
            ],
        );

        let value = assert_ok!(module.sksreg(Register::Channel, None).await);
        assert_eq!(value.as_deref(), Some("21"));
        let written = assert_ok!(module.sksreg(Register::PanId, Some("8888")).await);
        assert_eq!(written, None);
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_skjoin_outcomes() {
        let (module, peer) = start_module().await;
        let device = play(
            peer,
            vec![
                exchange(
                    format!("SKJOIN {}\r\n", METER),
                    &[
                        &[&format!("SKJOIN {}", METER), "OK"],
                        &[&format!("EVENT 21 {} 00", METER)],
                        &[&format!("EVENT 25 {}", METER)],
                    ],
                ),
                exchange(
                    format!("SKJOIN {}\r\n", METER),
                    &[
                        &[&format!("SKJOIN {}", METER), "OK"],
                        &[&format!("EVENT 24 {}", METER)],
                    ],
                ),
            ],
        );

        assert_ok!(module.skjoin(METER).await);
        assert!(matches!(
            module.skjoin(METER).await,
            Err(RouteBError::FailedToConnect)
        ));
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_skterm_close_timeout() {
        let (module, peer) = start_module().await;
        let device = play(
            peer,
            vec![exchange(
                "SKTERM\r\n",
                &[&["SKTERM", "OK"], &[&format!("EVENT 28 {}", METER)]],
            )],
        );

        assert!(matches!(
            module.skterm().await,
            Err(RouteBError::FailedToConnect)
        ));
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_sksendto_waits_for_correlated_reply() {
        let (module, peer) = start_module().await;
        module.set_bindings(LocalBindings::new(vec![LOCAL.to_string()], vec![0x0E1A]));

        let request = EchonetFrame::get_request(
            TransactionId(0x0101),
            EchonetObject::CONTROLLER,
            EchonetObject::SMART_METER,
            &[0xE7],
        );
        let payload = request.encode().unwrap();
        let command = "SKSENDTO 1 FE80:0000:0000:0000:021D:1290:1234:5678 0E1A 1 0 000E ";
        let mut written = command.as_bytes().to_vec();
        written.extend_from_slice(&payload);

        let reply = |tid: u16| {
            EchonetFrame::new(
                TransactionId(tid),
                EchonetObject::SMART_METER,
                EchonetObject::CONTROLLER,
                Esv::GetRes,
            )
            .with_property(RawProperty::new(0xE7, vec![0x00, 0x00, 0x01, 0x2C]))
            .encode()
            .unwrap()
        };
        let stale = erxudp(METER, LOCAL, &reply(0x0100));
        let fresh = erxudp(METER, LOCAL, &reply(0x0101));

        let device = play(
            peer,
            vec![exchange(
                written,
                &[
                    &[command, &format!("EVENT 21 {} 00", METER), "OK"],
                    &[&stale],
                    &[&fresh],
                ],
            )],
        );

        let reply = assert_ok!(
            module
                .sksendto(1, METER, 0x0E1A, SendSecurity::Strict, &request)
                .await
        );
        assert_eq!(reply.frame.tid, TransactionId(0x0101));
        assert_eq!(reply.frame.instantaneous_power().unwrap(), 300);
        assert!(reply.reception.secured);
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_sksendto_keeps_first_match_of_block() {
        let (module, peer) = start_module().await;
        module.set_bindings(LocalBindings::new(vec![LOCAL.to_string()], vec![0x0E1A]));

        let request = EchonetFrame::get_request(
            TransactionId(0x0202),
            EchonetObject::CONTROLLER,
            EchonetObject::SMART_METER,
            &[0xE7],
        );
        let payload = request.encode().unwrap();
        let command = "SKSENDTO 1 FE80:0000:0000:0000:021D:1290:1234:5678 0E1A 1 0 000E ";
        let mut written = command.as_bytes().to_vec();
        written.extend_from_slice(&payload);

        let reply = |tid: u16, watts: u8| {
            EchonetFrame::new(
                TransactionId(tid),
                EchonetObject::SMART_METER,
                EchonetObject::CONTROLLER,
                Esv::GetRes,
            )
            .with_property(RawProperty::new(0xE7, vec![0x00, 0x00, 0x00, watts]))
            .encode()
            .unwrap()
        };
        let foreign = erxudp(LOCAL, LOCAL, &reply(0x0202, 1));
        let first = erxudp(METER, LOCAL, &reply(0x0202, 2));
        let second = erxudp(METER, LOCAL, &reply(0x0202, 3));

        let device = play(
            peer,
            vec![exchange(
                written,
                &[&[command, "OK", &foreign, &first, &second]],
            )],
        );

        let reply = assert_ok!(
            module
                .sksendto(1, METER, 0x0E1A, SendSecurity::Strict, &request)
                .await
        );
        assert_eq!(reply.reception.sender, METER);
        assert_eq!(reply.frame.instantaneous_power().unwrap(), 2);
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_sksendto_requires_bindings() {
        let (module, _peer) = start_module().await;
        let frame = EchonetFrame::get_request(
            TransactionId(1),
            EchonetObject::CONTROLLER,
            EchonetObject::SMART_METER,
            &[0xE7],
        );
        let result = module
            .sksendto(1, METER, 0x0E1A, SendSecurity::Strict, &frame)
            .await;
        assert!(matches!(
            assert_err!(result),
            RouteBError::AddressUnavailable
        ));
    }

    #[tokio::test]
    async fn test_energy_detect_scan() {
        let (module, peer) = start_module().await;
        let device = play(
            peer,
            vec![exchange(
                "SKSCAN 0 FFFFFFFF 6 0\r\n",
                &[
                    &["SKSCAN 0 FFFFFFFF 6 0", "OK"],
                    &["EVENT 1F FE80:0000:0000:0000:021D:1290:0003:C890", "EEDSCAN", "21 2C 22 2D"],
                ],
            )],
        );

        let result = assert_ok!(module.skscan(ScanMode::EnergyDetect, 0xFFFF_FFFF, 6).await);
        assert_eq!(
            result,
            ScanResult::EnergyDetect(vec![
                EnergyScanResult { channel: 0x21, rssi: 0x2C },
                EnergyScanResult { channel: 0x22, rssi: 0x2D },
            ])
        );
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_skll64_and_skver() {
        let (module, peer) = start_module().await;
        let device = play(
            peer,
            vec![
                exchange("SKLL64 001D129012345678\r\n", &[&["SKLL64 001D129012345678", METER]]),
                exchange("SKVER\r\n", &[&["SKVER", "EVER 1.2.10", "OK"]]),
            ],
        );

        assert_eq!(assert_ok!(module.skll64(0x001D_1290_1234_5678).await), METER);
        assert_eq!(assert_ok!(module.skver().await), "1.2.10");
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_commands() {
        let (module, _peer) = start_module().await;
        assert!(matches!(
            module.skconnect(METER, 0x0E1A, 0x0E1A).await,
            Err(RouteBError::Unsupported("SKCONNECT"))
        ));
        assert!(matches!(
            module.wuart(0).await,
            Err(RouteBError::Unsupported("WUART"))
        ));
    }
}
