//! Outbound channel for pushes to the UI

use tokio::sync::broadcast;

use crate::models::OutboundMessage;

const DEFAULT_CAPACITY: usize = 512;

/// Receives `update` and `export` pushes from the recorder
pub trait RecorderSink: Send + Sync {
    fn push(&self, message: OutboundMessage);
}

/// Fan-out sink; pushes with no subscriber are dropped
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<OutboundMessage>,
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundMessage> {
        self.tx.subscribe()
    }
}

impl RecorderSink for BroadcastSink {
    fn push(&self, message: OutboundMessage) {
        let _ = self.tx.send(message);
    }
}

/// Discards every push
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RecorderSink for NullSink {
    fn push(&self, _message: OutboundMessage) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_pushes() {
        let sink = BroadcastSink::default();
        let mut rx = sink.subscribe();
        sink.push(OutboundMessage::Export { data: Vec::new() });
        assert_eq!(
            rx.recv().await.unwrap(),
            OutboundMessage::Export { data: Vec::new() }
        );
    }

    #[test]
    fn push_without_subscribers_is_dropped() {
        let sink = BroadcastSink::new(4);
        sink.push(OutboundMessage::error("nobody listening"));
        NullSink.push(OutboundMessage::error("ignored"));
    }
}
