//! Command transaction engine
//!
//! A transaction writes one command, collects the line blocks that follow it
//! and ends when a completion predicate fires, a `FAIL` line shows up, the
//! deadline passes or the shutdown signal is raised.

use crate::event::{decode_events, Event};
use crate::multiplexer::{LineBlock, Observer, ObserverId, ObserverRegistry, StreamMultiplexer};
use routeb_core::{DeviceError, RouteBError, RouteBResult, FAIL_MARKER};
use routeb_transport::StreamAccessor;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

const LINE_TERMINATOR: &[u8] = b"\r\n";
const OK_PREFIX: &str = "OK";

/// Completion predicate evaluated on every block of a transaction
pub type Stopper = Arc<dyn Fn(&LineBlock) -> bool + Send + Sync>;

/// Transaction deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Deadline of an ordinary command
    pub default_timeout: Duration,
    /// Factor applied for join, rejoin, terminate, send and ping
    pub long_multiplier: u32,
    /// Deadline of SKSCAN
    pub scan_timeout: Duration,
}

impl ExecutorSettings {
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            long_multiplier: 2,
            scan_timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_long_multiplier(mut self, multiplier: u32) -> Self {
        self.long_multiplier = multiplier.max(1);
        self
    }

    #[must_use]
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Deadline for network round trips
    pub fn long_timeout(&self) -> Duration {
        self.default_timeout * self.long_multiplier
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// One command to execute
#[derive(Clone)]
pub struct CommandRequest {
    command: String,
    payload: Option<Vec<u8>>,
    stopper: Option<Stopper>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for CommandRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRequest")
            .field("command", &self.command)
            .field("payload", &self.payload.as_ref().map(Vec::len))
            .field("stopper", &self.stopper.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CommandRequest {
    /// Command line without terminator, e.g. `SKSREG S02`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            payload: None,
            stopper: None,
            timeout: None,
        }
    }

    /// Send raw bytes directly after the command text instead of CRLF
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Replace the default completion predicate (a blank block)
    #[must_use]
    pub fn with_stopper<F>(mut self, stopper: F) -> Self
    where
        F: Fn(&LineBlock) -> bool + Send + Sync + 'static,
    {
        self.stopper = Some(Arc::new(stopper));
        self
    }

    /// Complete once any line starts with one of `prefixes`
    #[must_use]
    pub fn stop_on_prefixes<I, S>(self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        self.with_stopper(move |block: &LineBlock| {
            block
                .lines()
                .iter()
                .any(|line| prefixes.iter().any(|prefix| line.starts_with(prefix.as_str())))
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    fn wire_bytes(&self) -> Vec<u8> {
        let mut bytes = self.command.as_bytes().to_vec();
        match &self.payload {
            Some(payload) => bytes.extend_from_slice(payload),
            None => bytes.extend_from_slice(LINE_TERMINATOR),
        }
        bytes
    }

    /// Whether `line` is the device's echo of this command
    fn is_echo(&self, line: &str) -> bool {
        if line == self.command || line.trim_end() == self.command.trim_end() {
            return true;
        }
        // The echo of a binary send may carry part of the payload
        self.payload.is_some() && line.starts_with(self.command.trim_end())
    }
}

/// Successful transaction result
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResponse {
    /// Lines between the echo and the first `OK` line
    pub output: Vec<String>,
    /// Events decoded from every line after the echo
    pub events: Vec<Event>,
}

impl CommandResponse {
    /// First event for which `f` returns a value
    pub fn find_event<R>(&self, f: impl FnMut(&Event) -> Option<R>) -> Option<R> {
        self.events.iter().find_map(f)
    }
}

struct TransactionState {
    lines: Vec<String>,
    done: Option<oneshot::Sender<Vec<String>>>,
}

/// Transient observer collecting the blocks of one transaction
struct TransactionObserver {
    stopper: Option<Stopper>,
    state: Mutex<TransactionState>,
}

impl Observer for TransactionObserver {
    fn on_block(&self, block: &LineBlock) -> RouteBResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.done.is_none() || block.is_empty() {
            return Ok(());
        }
        // A blank block before any response line is the idle marker of an
        // earlier exchange
        if self.stopper.is_none() && block.is_blank() && state.lines.is_empty() {
            return Ok(());
        }

        let failed = block.has_line_starting_with(&[FAIL_MARKER]);
        let stop = failed
            || match &self.stopper {
                Some(stopper) => stopper(block),
                None => block.is_blank(),
            };

        if !(stop && self.stopper.is_none() && block.is_blank()) {
            state.lines.extend(block.lines().iter().cloned());
        }

        if stop {
            let lines = std::mem::take(&mut state.lines);
            if let Some(done) = state.done.take() {
                // The waiter may already have timed out
                let _ = done.send(lines);
            }
        }
        Ok(())
    }
}

/// Removes a transaction observer however the transaction ends
struct Registration<'a> {
    registry: &'a ObserverRegistry,
    id: ObserverId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

/// Runs command transactions against a streaming multiplexer, one at a time
pub struct CommandExecutor<T: StreamAccessor> {
    mux: Arc<StreamMultiplexer<T>>,
    settings: ExecutorSettings,
    flight: tokio::sync::Mutex<()>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<T: StreamAccessor> std::fmt::Debug for CommandExecutor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("settings", &self.settings)
            .field("streaming", &self.mux.is_streaming())
            .finish()
    }
}

impl<T: StreamAccessor> CommandExecutor<T> {
    pub fn new(mux: Arc<StreamMultiplexer<T>>) -> Self {
        Self::with_settings(mux, ExecutorSettings::default())
    }

    pub fn with_settings(mux: Arc<StreamMultiplexer<T>>, settings: ExecutorSettings) -> Self {
        Self {
            mux,
            settings,
            flight: tokio::sync::Mutex::new(()),
            shutdown: None,
        }
    }

    /// Abort waiting transactions with `Cancelled` once `shutdown` turns true
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub fn multiplexer(&self) -> &Arc<StreamMultiplexer<T>> {
        &self.mux
    }

    /// Execute one command
    ///
    /// # Arguments
    ///
    /// * `request` - Command text, optional payload, predicate and deadline
    ///
    /// # Returns
    ///
    /// Output lines and decoded events on success. Fails with `Device` if any
    /// collected line starts with `FAIL`, `EchobackMismatch` if the command
    /// echo is missing, `Timeout` or `Cancelled` if the transaction did not
    /// complete, and `NotStreaming` if the read loop is not running.
    pub async fn execute(&self, request: CommandRequest) -> RouteBResult<CommandResponse> {
        if !self.mux.is_streaming() {
            return Err(RouteBError::NotStreaming);
        }
        let _flight = self.flight.lock().await;

        let timeout = request.timeout.unwrap_or(self.settings.default_timeout);
        let (done_tx, done_rx) = oneshot::channel();
        let observer = Arc::new(TransactionObserver {
            stopper: request.stopper.clone(),
            state: Mutex::new(TransactionState {
                lines: Vec::new(),
                done: Some(done_tx),
            }),
        });

        let registration = Registration {
            registry: self.mux.observers(),
            id: self.mux.register(observer),
        };
        log::debug!("Executing {}", request.command);
        self.mux.write_all(&request.wire_bytes()).await?;

        let lines = tokio::select! {
            lines = done_rx => lines.map_err(|_| RouteBError::Cancelled)?,
            _ = tokio::time::sleep(timeout) => {
                log::debug!("{} timed out after {:?}", request.command, timeout);
                return Err(RouteBError::Timeout);
            }
            _ = wait_for_shutdown(self.shutdown.clone()) => {
                log::debug!("{} cancelled", request.command);
                return Err(RouteBError::Cancelled);
            }
        };
        drop(registration);

        interpret(&request, lines)
    }
}

async fn wait_for_shutdown(shutdown: Option<watch::Receiver<bool>>) {
    if let Some(mut shutdown) = shutdown {
        let stopped = shutdown.wait_for(|stop| *stop).await.is_ok();
        if stopped {
            return;
        }
    }
    std::future::pending::<()>().await
}

fn interpret(request: &CommandRequest, lines: Vec<String>) -> RouteBResult<CommandResponse> {
    if let Some(line) = lines.iter().find(|line| line.starts_with(FAIL_MARKER)) {
        let error = DeviceError::from_fail_line(line);
        log::debug!("{} failed: {}", request.command, error);
        return Err(RouteBError::Device(error));
    }

    let Some(echo) = lines.iter().position(|line| request.is_echo(line)) else {
        return Err(RouteBError::EchobackMismatch(request.command.trim_end().to_string()));
    };

    let after_echo = &lines[echo + 1..];
    let end = after_echo
        .iter()
        .position(|line| line.starts_with(OK_PREFIX))
        .unwrap_or(after_echo.len());

    Ok(CommandResponse {
        output: after_echo[..end].to_vec(),
        events: decode_events(after_echo),
    })
}
