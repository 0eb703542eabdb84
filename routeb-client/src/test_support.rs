//! Scripted Wi-SUN module for tests

use crate::module::WisunModule;
use routeb_core::hex;
use routeb_skstack::{CommandExecutor, DebounceSettings, StreamMultiplexer};
use routeb_transport::{memory_pair, MemoryPeer, MemoryTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub(crate) const METER: &str = "FE80:0000:0000:0000:021D:1290:1234:5678";
pub(crate) const LOCAL: &str = "FE80:0000:0000:0000:021D:1290:0003:C890";

/// One command the host must write and the blocks the device answers with
pub(crate) struct Exchange {
    expect: Vec<u8>,
    blocks: Vec<Vec<String>>,
}

pub(crate) fn exchange(expect: impl AsRef<[u8]>, blocks: &[&[&str]]) -> Exchange {
    Exchange {
        expect: expect.as_ref().to_vec(),
        blocks: blocks
            .iter()
            .map(|block| block.iter().map(|line| line.to_string()).collect())
            .collect(),
    }
}

/// `ERXUDP` line as printed by firmware with the reserved column
pub(crate) fn erxudp(sender: &str, destination: &str, data: &[u8]) -> String {
    format!(
        "ERXUDP {} {} 0E1A 0E1A 001D129012345678 1 0 {:04X} {}",
        sender,
        destination,
        data.len(),
        hex::encode_bytes(data)
    )
}

/// Replay `exchanges` in order, pausing between the blocks of one answer
pub(crate) fn play(mut peer: MemoryPeer, exchanges: Vec<Exchange>) -> JoinHandle<MemoryPeer> {
    tokio::spawn(async move {
        for exchange in exchanges {
            let written = peer.recv().await.unwrap();
            assert_eq!(
                String::from_utf8_lossy(&written),
                String::from_utf8_lossy(&exchange.expect)
            );
            for (i, block) in exchange.blocks.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                }
                let lines: Vec<&str> = block.iter().map(String::as_str).collect();
                peer.send_lines(&lines);
            }
        }
        peer
    })
}

/// Module over a streaming in-memory transport
pub(crate) async fn start_module() -> (Arc<WisunModule<MemoryTransport>>, MemoryPeer) {
    let (transport, peer) = memory_pair();
    let settings =
        DebounceSettings::new().with_backoff(Duration::from_millis(1), Duration::from_millis(2));
    let mux = Arc::new(StreamMultiplexer::with_settings(transport, settings));
    tokio::spawn({
        let mux = Arc::clone(&mux);
        async move { mux.run().await }
    });
    while !mux.is_streaming() {
        tokio::task::yield_now().await;
    }
    (Arc::new(WisunModule::new(CommandExecutor::new(mux))), peer)
}
