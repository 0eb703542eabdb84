//! Long-lived event subscription

use crate::event::{decode_events, Event};
use crate::multiplexer::{LineBlock, ObserverId, ObserverRegistry, StreamMultiplexer};
use routeb_core::RouteBResult;
use routeb_transport::StreamAccessor;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives every event decoded from the stream until dropped
///
/// Unlike a transaction, a subscription sees notifications that arrive
/// between commands, such as `EVENT 29` when the PANA session expires.
#[derive(Debug)]
pub struct EventSubscription {
    registry: Arc<ObserverRegistry>,
    id: ObserverId,
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventSubscription {
    pub fn subscribe<T: StreamAccessor>(mux: &StreamMultiplexer<T>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let registry = Arc::clone(mux.observers());
        let id = registry.register(Arc::new(move |block: &LineBlock| -> RouteBResult<()> {
            for event in decode_events(block.lines()) {
                // A closed receiver is removed when the subscription drops
                let _ = sender.send(event);
            }
            Ok(())
        }));
        Self {
            registry,
            id,
            receiver,
        }
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}
