//! Stream multiplexer
//!
//! SKSTACK output has no framing beyond CRLF line terminators, so the stream
//! is cut into blocks at quiet periods. A boundary is declared when:
//!
//! - no byte has arrived for `quiet_polls` consecutive polls,
//! - the buffer differs from the previously emitted block, and
//! - the buffer does not end with a bare `\r`.
//!
//! The buffer is cleared after each block, so an idle period following a
//! block produces one blank-line block. Command transactions use that blank
//! block as their default end-of-response marker.
//!
//! Each block is delivered to every registered observer in registration order.

use routeb_core::{RouteBError, RouteBResult};
use routeb_transport::StreamAccessor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const LINE_TERMINATOR: &str = "\r\n";

/// Block boundary detection parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceSettings {
    /// Consecutive empty polls before a block boundary (at least 5)
    pub quiet_polls: u32,
    /// Sleep per consecutive empty poll
    pub backoff_step: Duration,
    /// Upper bound for the sleep between empty polls
    pub max_backoff: Duration,
    /// Bytes requested per read
    pub read_chunk: usize,
}

impl DebounceSettings {
    pub const MIN_QUIET_POLLS: u32 = 5;

    /// Create debounce settings with default parameters
    pub fn new() -> Self {
        Self {
            quiet_polls: Self::MIN_QUIET_POLLS,
            backoff_step: Duration::from_millis(2),
            max_backoff: Duration::from_millis(50),
            read_chunk: 255,
        }
    }

    /// Set the number of quiet polls; values below 5 are raised to 5
    pub fn with_quiet_polls(mut self, quiet_polls: u32) -> Self {
        self.quiet_polls = quiet_polls.max(Self::MIN_QUIET_POLLS);
        self
    }

    pub fn with_backoff(mut self, step: Duration, max: Duration) -> Self {
        self.backoff_step = step;
        self.max_backoff = max;
        self
    }

    pub fn with_read_chunk(mut self, read_chunk: usize) -> Self {
        self.read_chunk = read_chunk.max(1);
        self
    }

    /// Sleep after `empty_polls` consecutive empty polls
    pub fn backoff(&self, empty_polls: u32) -> Duration {
        self.backoff_step
            .saturating_mul(empty_polls)
            .min(self.max_backoff)
    }
}

impl Default for DebounceSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// Lines produced from one quiet period on the stream
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineBlock {
    lines: Vec<String>,
}

impl LineBlock {
    /// Build a block from raw buffer contents
    ///
    /// One trailing CRLF is stripped and the rest is split on CRLF. An empty
    /// buffer yields a single blank line.
    pub fn from_bytes(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let text = text.strip_suffix(LINE_TERMINATOR).unwrap_or(&*text);
        Self {
            lines: text.split(LINE_TERMINATOR).map(str::to_string).collect(),
        }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether the block is exactly one blank line
    pub fn is_blank(&self) -> bool {
        matches!(self.lines.as_slice(), [line] if line.is_empty())
    }

    /// Whether any line starts with one of `prefixes`
    pub fn has_line_starting_with(&self, prefixes: &[&str]) -> bool {
        self.lines
            .iter()
            .any(|line| prefixes.iter().any(|prefix| line.starts_with(prefix)))
    }
}

/// Result of an empty poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A block boundary was reached
    Emit(LineBlock),
    /// Keep polling after sleeping for the given duration
    Wait(Duration),
}

/// Block boundary state machine
///
/// Pure: it never touches the stream or the clock, so the boundary rules can
/// be exercised with arbitrary arrival patterns.
#[derive(Debug, Clone)]
pub struct BlockAccumulator {
    settings: DebounceSettings,
    buffer: Vec<u8>,
    previous: Vec<u8>,
    empty_polls: u32,
}

impl BlockAccumulator {
    pub fn new(settings: DebounceSettings) -> Self {
        Self {
            settings,
            buffer: Vec::new(),
            previous: Vec::new(),
            empty_polls: 0,
        }
    }

    /// Record bytes from a non-empty read
    pub fn feed(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(bytes);
        self.empty_polls = 0;
    }

    /// Record an empty read
    pub fn idle_poll(&mut self) -> PollOutcome {
        self.empty_polls = self.empty_polls.saturating_add(1);

        if self.empty_polls < self.settings.quiet_polls
            || self.buffer == self.previous
            || self.buffer.ends_with(b"\r")
        {
            return PollOutcome::Wait(self.settings.backoff(self.empty_polls));
        }

        let block = LineBlock::from_bytes(&self.buffer);
        self.previous = std::mem::take(&mut self.buffer);
        self.empty_polls = 0;
        PollOutcome::Emit(block)
    }

    /// Take whatever is buffered when the stream ends
    pub fn flush(&mut self) -> Option<LineBlock> {
        if self.buffer.is_empty() {
            return None;
        }
        let block = LineBlock::from_bytes(&self.buffer);
        self.previous = std::mem::take(&mut self.buffer);
        Some(block)
    }

    /// Bytes received since the last block
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }
}

/// Receiver of line blocks
///
/// Returning an error stops the stream loop and propagates the error to the
/// caller of `StreamMultiplexer::run`.
pub trait Observer: Send + Sync {
    fn on_block(&self, block: &LineBlock) -> RouteBResult<()>;
}

impl<F> Observer for F
where
    F: Fn(&LineBlock) -> RouteBResult<()> + Send + Sync,
{
    fn on_block(&self, block: &LineBlock) -> RouteBResult<()> {
        self(block)
    }
}

/// Handle returned by `ObserverRegistry::register`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registered observers behind a single lock
///
/// Broadcasts iterate over a snapshot, so observers may register or
/// deregister (themselves included) while a block is being delivered.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: Mutex<Vec<(ObserverId, Arc<dyn Observer>)>>,
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    /// Remove an observer; returns whether it was registered
    pub fn deregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(registered, _)| *registered != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }

    /// Deliver a block to every observer registered at call time
    pub fn broadcast(&self, block: &LineBlock) -> RouteBResult<()> {
        for observer in self.snapshot() {
            observer.on_block(block)?;
        }
        Ok(())
    }
}

/// Clears the streaming flag when the read loop exits
struct StreamingGuard<'a>(&'a AtomicBool);

impl Drop for StreamingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shares one byte stream between the block broadcaster and command writers
#[derive(Debug)]
pub struct StreamMultiplexer<T: StreamAccessor> {
    transport: tokio::sync::Mutex<T>,
    observers: Arc<ObserverRegistry>,
    streaming: AtomicBool,
    settings: DebounceSettings,
}

impl<T: StreamAccessor> StreamMultiplexer<T> {
    /// Create a multiplexer over an opened transport
    pub fn new(transport: T) -> Self {
        Self::with_settings(transport, DebounceSettings::default())
    }

    pub fn with_settings(transport: T, settings: DebounceSettings) -> Self {
        Self {
            transport: tokio::sync::Mutex::new(transport),
            observers: Arc::new(ObserverRegistry::new()),
            streaming: AtomicBool::new(false),
            settings,
        }
    }

    pub fn settings(&self) -> &DebounceSettings {
        &self.settings
    }

    /// Observer registry shared with subscriptions
    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.observers
    }

    pub fn register(&self, observer: Arc<dyn Observer>) -> ObserverId {
        self.observers.register(observer)
    }

    pub fn deregister(&self, id: ObserverId) -> bool {
        self.observers.deregister(id)
    }

    /// Whether `run` is currently active
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Read the stream and broadcast blocks until it closes
    ///
    /// # Returns
    ///
    /// `Ok(())` once the transport reports closed, the first observer or read
    /// error otherwise. Fails with `AlreadyStreaming` if another `run` is
    /// active on this multiplexer.
    pub async fn run(&self) -> RouteBResult<()> {
        if self
            .streaming
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RouteBError::AlreadyStreaming);
        }
        let _guard = StreamingGuard(&self.streaming);

        let mut accumulator = BlockAccumulator::new(self.settings);
        let mut buf = vec![0u8; self.settings.read_chunk];

        loop {
            let (n, closed) = {
                let mut transport = self.transport.lock().await;
                let n = transport.read_once(&mut buf).await?;
                (n, transport.is_closed())
            };

            if n > 0 {
                log::trace!("RX {}", String::from_utf8_lossy(&buf[..n]).escape_debug());
                accumulator.feed(&buf[..n]);
                continue;
            }

            if closed {
                if let Some(block) = accumulator.flush() {
                    self.observers.broadcast(&block)?;
                }
                log::debug!("Stream closed, stopping read loop");
                return Ok(());
            }

            match accumulator.idle_poll() {
                PollOutcome::Emit(block) => self.observers.broadcast(&block)?,
                PollOutcome::Wait(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Write bytes to the stream and flush
    pub async fn write_all(&self, data: &[u8]) -> RouteBResult<()> {
        log::trace!("TX {}", String::from_utf8_lossy(data).escape_debug());
        let mut transport = self.transport.lock().await;
        transport.write_all(data).await?;
        transport.flush().await
    }

    /// Close the underlying stream; the read loop then ends
    pub async fn close(&self) -> RouteBResult<()> {
        self.transport.lock().await.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routeb_transport::memory_pair;
    use std::sync::atomic::AtomicUsize;
    use tokio_test::{assert_err, assert_ok};

    fn fast_settings() -> DebounceSettings {
        DebounceSettings::new().with_backoff(Duration::from_millis(1), Duration::from_millis(2))
    }

    fn poll_until_emit(acc: &mut BlockAccumulator, max: usize) -> Option<LineBlock> {
        for _ in 0..max {
            if let PollOutcome::Emit(block) = acc.idle_poll() {
                return Some(block);
            }
        }
        None
    }

    #[test]
    fn test_line_block_split() {
        let block = LineBlock::from_bytes(b"SKVER\r\nEVER 1.2.10\r\nOK\r\n");
        assert_eq!(block.lines(), ["SKVER", "EVER 1.2.10", "OK"]);

        let blank = LineBlock::from_bytes(b"");
        assert!(blank.is_blank());
        assert!(LineBlock::from_bytes(b"\r\n").is_blank());
        assert!(!LineBlock::from_bytes(b"A\r\n\r\n").is_blank());
    }

    #[test]
    fn test_boundary_needs_quiet_polls() {
        let mut acc = BlockAccumulator::new(DebounceSettings::new());
        acc.feed(b"SKINFO\r\n");
        for _ in 0..4 {
            assert!(matches!(acc.idle_poll(), PollOutcome::Wait(_)));
        }
        assert_eq!(
            acc.idle_poll(),
            PollOutcome::Emit(LineBlock::from_lines(["SKINFO"]))
        );
        assert!(acc.pending().is_empty());
    }

    #[test]
    fn test_bare_carriage_return_holds_block() {
        let mut acc = BlockAccumulator::new(DebounceSettings::new());
        acc.feed(b"OK\r");
        assert!(poll_until_emit(&mut acc, 20).is_none());
        acc.feed(b"\n");
        assert_eq!(poll_until_emit(&mut acc, 5), Some(LineBlock::from_lines(["OK"])));
    }

    #[test]
    fn test_blank_block_after_idle() {
        let mut acc = BlockAccumulator::new(DebounceSettings::new());
        acc.feed(b"SKSAVE\r\n");
        assert!(poll_until_emit(&mut acc, 5).is_some());
        assert!(poll_until_emit(&mut acc, 5).unwrap().is_blank());
        // Nothing more until new bytes arrive
        assert!(poll_until_emit(&mut acc, 50).is_none());
    }

    #[test]
    fn test_jitter_resets_quiet_count() {
        let mut acc = BlockAccumulator::new(DebounceSettings::new());
        // Bytes trickle in with gaps shorter than the quiet window
        let chunks: [&[u8]; 4] = [
            b"ERXUDP FE80",
            b"::1 FE80::2 0E1A",
            b" 0E1A 0011 1 0 0004 ",
            b"0102\r\n",
        ];
        for chunk in chunks {
            acc.feed(chunk);
            for _ in 0..3 {
                assert!(matches!(acc.idle_poll(), PollOutcome::Wait(_)));
            }
        }
        let block = poll_until_emit(&mut acc, 5).unwrap();
        assert_eq!(
            block.lines(),
            ["ERXUDP FE80::1 FE80::2 0E1A 0E1A 0011 1 0 0004 0102"]
        );
    }

    #[test]
    fn test_repeated_block_is_held() {
        let mut acc = BlockAccumulator::new(DebounceSettings::new());
        acc.feed(b"X\r\n");
        assert!(poll_until_emit(&mut acc, 5).is_some());
        acc.feed(b"X\r\n");
        assert!(poll_until_emit(&mut acc, 20).is_none());
        acc.feed(b"Y\r\n");
        assert_eq!(
            poll_until_emit(&mut acc, 5),
            Some(LineBlock::from_lines(["X", "Y"]))
        );
    }

    #[test]
    fn test_backoff_is_linear_and_capped() {
        let settings = DebounceSettings::new();
        assert_eq!(settings.backoff(1), Duration::from_millis(2));
        assert_eq!(settings.backoff(3), Duration::from_millis(6));
        assert_eq!(settings.backoff(1000), Duration::from_millis(50));
        assert_eq!(DebounceSettings::new().with_quiet_polls(2).quiet_polls, 5);
    }

    #[test]
    fn test_registry_snapshot_allows_self_removal() {
        let registry = Arc::new(ObserverRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let id_slot: Arc<Mutex<Option<ObserverId>>> = Arc::new(Mutex::new(None));
        let observer = {
            let registry = Arc::clone(&registry);
            let calls = Arc::clone(&calls);
            let id_slot = Arc::clone(&id_slot);
            move |_: &LineBlock| -> RouteBResult<()> {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *id_slot.lock().unwrap() {
                    registry.deregister(id);
                }
                Ok(())
            }
        };
        let id = registry.register(Arc::new(observer));
        *id_slot.lock().unwrap() = Some(id);

        let counter = Arc::clone(&calls);
        registry.register(Arc::new(move |_: &LineBlock| -> RouteBResult<()> {
            counter.fetch_add(10, Ordering::SeqCst);
            Ok(())
        }));

        registry.broadcast(&LineBlock::default()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert_eq!(registry.len(), 1);

        registry.broadcast(&LineBlock::default()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 21);
    }

    #[tokio::test]
    async fn test_run_delivers_blocks_in_order() {
        let (transport, peer) = memory_pair();
        let mux = Arc::new(StreamMultiplexer::with_settings(transport, fast_settings()));

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        mux.register(Arc::new(move |block: &LineBlock| -> RouteBResult<()> {
            let _ = tx.send(block.clone());
            Ok(())
        }));

        let runner = tokio::spawn({
            let mux = Arc::clone(&mux);
            async move { mux.run().await }
        });

        peer.send_lines(&["EVENT 21 FE80:0000:0000:0000:021D:1290:1234:5678 00"]);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.lines(), ["EVENT 21 FE80:0000:0000:0000:021D:1290:1234:5678 00"]);
        assert!(rx.recv().await.unwrap().is_blank());

        assert_eq!(assert_err!(mux.run().await).to_string(), "Already streaming");

        drop(peer);
        assert_ok!(runner.await.unwrap());
        assert!(!mux.is_streaming());
    }

    #[tokio::test]
    async fn test_observer_error_stops_loop() {
        let (transport, peer) = memory_pair();
        let mux = StreamMultiplexer::with_settings(transport, fast_settings());
        mux.register(Arc::new(|_: &LineBlock| -> RouteBResult<()> {
            Err(RouteBError::InvalidData("stop".to_string()))
        }));

        peer.send_lines(&["OK"]);
        let result = mux.run().await;
        assert!(matches!(result, Err(RouteBError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_write_reaches_device() {
        let (transport, mut peer) = memory_pair();
        let mux = StreamMultiplexer::new(transport);
        assert_ok!(mux.write_all(b"SKINFO\r\n").await);
        assert_eq!(peer.recv().await.unwrap(), b"SKINFO\r\n".to_vec());
    }
}
