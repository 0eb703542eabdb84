//! Serial line to the Wi-SUN module

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use routeb_core::{RouteBError, RouteBResult};
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

/// Default baud rate of MB-RL7023-11 class modules
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Line settings of the module's UART
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
    /// How long a single `read_once` waits for the first byte
    pub poll_interval: Duration,
    /// Upper bound for a single write, `None` to wait forever
    pub write_timeout: Option<Duration>,
}

impl SerialSettings {
    /// 115200 baud 8N1 without flow control, as shipped
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow_control: FlowControl::None,
            poll_interval: Duration::from_millis(10),
            write_timeout: Some(Duration::from_secs(5)),
        }
    }

    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Character framing; modules reconfigured with `WUART` may need this
    #[must_use]
    pub fn with_framing(mut self, data_bits: DataBits, parity: Parity, stop_bits: StopBits) -> Self {
        self.data_bits = data_bits;
        self.parity = parity;
        self.stop_bits = stop_bits;
        self
    }

    #[must_use]
    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_write_timeout(mut self, write_timeout: Option<Duration>) -> Self {
        self.write_timeout = write_timeout;
        self
    }
}

enum Port {
    /// Never opened, or closed by the host
    Closed,
    Open(SerialStream),
    /// The device went away; the port has to be reopened
    HungUp,
}

/// Serial transport of a Wi-SUN module
pub struct SerialTransport {
    settings: SerialSettings,
    port: Port,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.port {
            Port::Closed => "closed",
            Port::Open(_) => "open",
            Port::HungUp => "hung up",
        };
        f.debug_struct("SerialTransport")
            .field("port_name", &self.settings.port_name)
            .field("baud_rate", &self.settings.baud_rate)
            .field("state", &state)
            .finish()
    }
}

impl SerialTransport {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            port: Port::Closed,
        }
    }

    /// Wrap a port that is already open, such as one end of a pty pair
    pub fn from_stream(settings: SerialSettings, stream: SerialStream) -> Self {
        Self {
            settings,
            port: Port::Open(stream),
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    fn stream(&mut self) -> RouteBResult<&mut SerialStream> {
        match &mut self.port {
            Port::Open(stream) => Ok(stream),
            Port::Closed | Port::HungUp => Err(RouteBError::Connection(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is not open", self.settings.port_name),
            ))),
        }
    }

    fn hang_up(&mut self, e: io::Error) -> RouteBError {
        log::warn!("{} hung up: {}", self.settings.port_name, e);
        self.port = Port::HungUp;
        RouteBError::Connection(e)
    }
}

#[async_trait]
impl TransportLayer for SerialTransport {
    async fn open(&mut self) -> RouteBResult<()> {
        if matches!(self.port, Port::Open(_)) {
            return Err(RouteBError::Connection(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is already open", self.settings.port_name),
            )));
        }

        let settings = &self.settings;
        let stream = tokio_serial::new(&settings.port_name, settings.baud_rate)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .parity(settings.parity)
            .flow_control(settings.flow_control)
            .open_native_async()
            .map_err(|e| {
                RouteBError::Connection(io::Error::other(format!(
                    "Failed to open {}: {}",
                    settings.port_name, e
                )))
            })?;

        log::debug!("Opened {} at {} baud", settings.port_name, settings.baud_rate);
        self.port = Port::Open(stream);
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for SerialTransport {
    async fn read_once(&mut self, buf: &mut [u8]) -> RouteBResult<usize> {
        let poll_interval = self.settings.poll_interval;
        // End of stream; `is_closed` reports it
        let Port::Open(stream) = &mut self.port else {
            return Ok(0);
        };

        let Ok(result) = tokio::time::timeout(poll_interval, stream.read(buf)).await else {
            return Ok(0);
        };
        match result {
            Ok(0) => {
                self.port = Port::HungUp;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => Err(self.hang_up(e)),
        }
    }

    async fn write(&mut self, buf: &[u8]) -> RouteBResult<usize> {
        let write_timeout = self.settings.write_timeout;
        let stream = self.stream()?;

        let result = match write_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.write(buf))
                .await
                .map_err(|_| RouteBError::Timeout)?,
            None => stream.write(buf).await,
        };
        result.map_err(|e| self.hang_up(e))
    }

    async fn flush(&mut self) -> RouteBResult<()> {
        let result = self.stream()?.flush().await;
        result.map_err(|e| self.hang_up(e))
    }

    fn is_closed(&self) -> bool {
        !matches!(self.port, Port::Open(_))
    }

    async fn close(&mut self) -> RouteBResult<()> {
        if let Port::Open(mut stream) = std::mem::replace(&mut self.port, Port::Closed) {
            // Unsent bytes are dropped with the port anyway
            let _ = stream.flush().await;
        }
        Ok(())
    }
}
