use async_trait::async_trait;
use bytes::Bytes;

/// One publish as delivered by the broker
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
    /// Assigned per delivery attempt; a redelivery reuses it
    pub packet_id: u16,
}

/// Per-message callback invoked by the session in delivery order.
///
/// Returns whether the message should be acknowledged to the broker.
/// Implementations must not block on unrelated network I/O.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &InboundMessage) -> bool;
}
