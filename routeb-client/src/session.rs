//! Route-B session bring-up and smart meter reading
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use routeb_client::{JoinTarget, RouteBCredentials, RouteBSession, SessionSettings};
//! use routeb_transport::{SerialSettings, SerialTransport, TransportLayer};
//!
//! # async fn run() -> routeb_core::RouteBResult<()> {
//! let mut transport = SerialTransport::new(SerialSettings::new("/dev/ttyUSB0"));
//! transport.open().await?;
//!
//! let session = RouteBSession::start(transport, SessionSettings::new()).await?;
//! let credentials = RouteBCredentials::new("00112233445566778899AABBCCDDEEFF", "0123456789AB");
//! let target = JoinTarget::new(0x21, 0x8888, "FE80:0000:0000:0000:021D:1290:1234:5678");
//! session.join(&credentials, &target).await?;
//!
//! let reader = session.meter_reader(&target.address);
//! let watts = reader.instantaneous_power().await?;
//! # Ok(())
//! # }
//! ```

use crate::module::{ScanMode, ScanResult, SendSecurity, WisunModule};
use crate::register::Register;
use routeb_core::{RouteBError, RouteBResult};
use routeb_echonet::smart_meter::EPC_INSTANTANEOUS_POWER;
use routeb_echonet::{EchonetFrame, EchonetObject, Property, PropertyRegistry, TransactionId};
use routeb_skstack::event::PanDescriptor;
use routeb_skstack::{
    CommandExecutor, DebounceSettings, EventSubscription, ExecutorSettings, StreamMultiplexer,
};
use routeb_transport::StreamAccessor;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// UDP port of ECHONET Lite
pub const ECHONET_LITE_PORT: u16 = 0x0E1A;

/// UDP handle bound to the ECHONET Lite port after `SKRESET`
pub const ECHONET_LITE_HANDLE: u8 = 1;

/// Channel mask covering every channel
pub const ALL_CHANNELS: u32 = 0xFFFF_FFFF;

/// Route-B authentication credentials issued by the electricity supplier
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteBCredentials {
    /// 32 character Route-B ID
    pub id: String,
    /// 12 character password
    pub password: String,
}

impl std::fmt::Debug for RouteBCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBCredentials")
            .field("id", &self.id)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RouteBCredentials {
    pub fn new(id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
        }
    }
}

/// PAN to join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTarget {
    pub channel: u8,
    pub pan_id: u16,
    /// Link-local IPv6 address of the smart meter
    pub address: String,
}

impl JoinTarget {
    pub fn new(channel: u8, pan_id: u16, address: impl Into<String>) -> Self {
        Self {
            channel,
            pan_id,
            address: address.into(),
        }
    }
}

/// PAN found by `RouteBSession::scan`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPan {
    pub descriptor: PanDescriptor,
    /// Link-local address derived from the descriptor's MAC address
    pub address: String,
}

impl DiscoveredPan {
    pub fn join_target(&self) -> JoinTarget {
        JoinTarget::new(
            self.descriptor.channel,
            self.descriptor.pan_id,
            self.address.clone(),
        )
    }
}

/// Settings of a session's protocol layers
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub debounce: DebounceSettings,
    pub executor: ExecutorSettings,
    pub shutdown: Option<watch::Receiver<bool>>,
}

impl SessionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: DebounceSettings) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorSettings) -> Self {
        self.executor = executor;
        self
    }

    /// Abort pending commands with `Cancelled` once `shutdown` turns true
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }
}

/// Wi-SUN module with a running read loop
#[derive(Debug)]
pub struct RouteBSession<T: StreamAccessor + 'static> {
    module: Arc<WisunModule<T>>,
    reader: JoinHandle<RouteBResult<()>>,
}

impl<T: StreamAccessor + 'static> RouteBSession<T> {
    /// Start streaming over an opened transport and initialize the module
    ///
    /// # Arguments
    ///
    /// * `transport` - Opened byte stream of the module
    /// * `settings` - Debounce, deadline and shutdown settings
    pub async fn start(transport: T, settings: SessionSettings) -> RouteBResult<Self> {
        let mux = Arc::new(StreamMultiplexer::with_settings(transport, settings.debounce));
        let reader = tokio::spawn({
            let mux = Arc::clone(&mux);
            async move {
                let result = mux.run().await;
                if let Err(e) = &result {
                    log::error!("Read loop stopped: {}", e);
                }
                result
            }
        });
        while !mux.is_streaming() {
            if reader.is_finished() {
                return Err(RouteBError::NotStreaming);
            }
            tokio::task::yield_now().await;
        }

        let mut executor = CommandExecutor::with_settings(mux, settings.executor);
        if let Some(shutdown) = settings.shutdown {
            executor = executor.with_shutdown(shutdown);
        }
        let module = Arc::new(WisunModule::new(executor));
        module.initialize().await?;

        Ok(Self { module, reader })
    }

    pub fn module(&self) -> &Arc<WisunModule<T>> {
        &self.module
    }

    /// Subscribe to every event decoded from the stream
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription::subscribe(self.module.multiplexer())
    }

    /// Register the Route-B ID and password
    pub async fn authenticate(&self, credentials: &RouteBCredentials) -> RouteBResult<()> {
        self.module.sksetrbid(&credentials.id).await?;
        self.module.sksetpwd(&credentials.password).await
    }

    /// Authenticate and join the PAN of a smart meter
    pub async fn join(&self, credentials: &RouteBCredentials, target: &JoinTarget) -> RouteBResult<()> {
        self.authenticate(credentials).await?;
        self.module
            .sksreg(Register::Channel, Some(&format!("{:02X}", target.channel)))
            .await?;
        self.module
            .sksreg(Register::PanId, Some(&format!("{:04X}", target.pan_id)))
            .await?;

        log::info!("Joining PAN {:04X} via {}", target.pan_id, target.address);
        self.module.skjoin(&target.address).await?;
        log::info!("Joined PAN {:04X}", target.pan_id);
        Ok(())
    }

    /// Active scan with IE on every channel
    ///
    /// The Route-B ID must be registered first; see `authenticate`.
    ///
    /// # Arguments
    ///
    /// * `duration` - Per-channel scan duration exponent
    pub async fn scan(&self, duration: u8) -> RouteBResult<Vec<DiscoveredPan>> {
        let ScanResult::Pans(descriptors) = self
            .module
            .skscan(ScanMode::ActiveWithIe, ALL_CHANNELS, duration)
            .await?
        else {
            return Err(RouteBError::UnexpectedOutput(
                "Active scan returned energy detect results".to_string(),
            ));
        };

        let mut pans = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let address = self.module.skll64(descriptor.mac).await?;
            log::info!(
                "Found PAN {:04X} on channel {:02X} at {}",
                descriptor.pan_id,
                descriptor.channel,
                address
            );
            pans.push(DiscoveredPan {
                descriptor,
                address,
            });
        }
        Ok(pans)
    }

    /// Reader for the smart meter at `address`
    pub fn meter_reader(&self, address: &str) -> SmartMeterReader<T> {
        SmartMeterReader::new(Arc::clone(&self.module), address)
    }

    /// Close the stream and wait for the read loop to end
    pub async fn close(self) -> RouteBResult<()> {
        self.module.multiplexer().close().await?;
        self.reader
            .await
            .map_err(|e| RouteBError::Connection(std::io::Error::other(e)))?
    }
}

/// ECHONET Lite client of the low-voltage smart electric energy meter
#[derive(Debug)]
pub struct SmartMeterReader<T: StreamAccessor> {
    module: Arc<WisunModule<T>>,
    address: String,
    next_tid: AtomicU16,
    registry: PropertyRegistry,
}

impl<T: StreamAccessor> SmartMeterReader<T> {
    /// Create a reader; the first transaction id is random
    pub fn new(module: Arc<WisunModule<T>>, address: impl Into<String>) -> Self {
        Self {
            module,
            address: address.into(),
            next_tid: AtomicU16::new(rand::random()),
            registry: PropertyRegistry::default(),
        }
    }

    #[must_use]
    pub fn with_transaction_id(self, tid: TransactionId) -> Self {
        self.next_tid.store(tid.value(), Ordering::Relaxed);
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: PropertyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn next_transaction_id(&self) -> TransactionId {
        TransactionId(self.next_tid.fetch_add(1, Ordering::Relaxed))
    }

    async fn request(&self, epcs: &[u8]) -> RouteBResult<EchonetFrame> {
        let frame = EchonetFrame::get_request(
            self.next_transaction_id(),
            EchonetObject::CONTROLLER,
            EchonetObject::SMART_METER,
            epcs,
        );
        let reply = self
            .module
            .sksendto(
                ECHONET_LITE_HANDLE,
                &self.address,
                ECHONET_LITE_PORT,
                SendSecurity::Strict,
                &frame,
            )
            .await?;

        if reply.frame.esv.is_error_response() {
            return Err(RouteBError::UnexpectedOutput(format!(
                "Smart meter rejected Get with ESV 0x{:02X}",
                reply.frame.esv.as_u8()
            )));
        }
        Ok(reply.frame)
    }

    /// Read properties of the smart meter
    ///
    /// # Arguments
    ///
    /// * `epcs` - Property codes to read
    ///
    /// # Returns
    ///
    /// The reported properties, decoded where the registry knows them
    pub async fn get(&self, epcs: &[u8]) -> RouteBResult<Vec<Property>> {
        let frame = self.request(epcs).await?;
        Ok(frame.interpret(&self.registry))
    }

    /// Instantaneous power in watts
    pub async fn instantaneous_power(&self) -> RouteBResult<i32> {
        let frame = self.request(&[EPC_INSTANTANEOUS_POWER]).await?;
        let watts = frame.instantaneous_power()?;
        log::debug!("Instantaneous power: {} W", watts);
        Ok(watts)
    }

    /// Close the PANA session with the meter
    pub async fn terminate(&self) -> RouteBResult<()> {
        self.module.skterm().await?;
        log::info!("Disconnected from {}", self.address);
        Ok(())
    }
}
