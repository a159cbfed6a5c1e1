use crate::domain::InboundMessage;
use async_trait::async_trait;

/// Something the broker session reported
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// CONNACK received. `session_present` is true when the broker resumed
    /// a stored session.
    ConnectionUp { session_present: bool },
    Message(InboundMessage),
    /// SUBACK received with every filter granted
    Subscribed,
    /// Our DISCONNECT went out; nothing more will arrive on this connection
    Closed,
    /// Anything else: pings, outgoing packets
    Idle,
}

/// Faults reported by [`SessionTransport::poll`]. Every variant ends the
/// current connection; the next poll reconnects.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),

    /// SUBACK carried a failure reason code
    #[error("subscription refused: {0}")]
    SubscriptionRefused(String),

    /// The broker sent DISCONNECT
    #[error("broker disconnected: {0}")]
    ServerDisconnect(String),

    #[error("client error: {0}")]
    Client(String),
}

/// Seam between the session loop and the MQTT client library
#[async_trait]
pub trait SessionTransport: Send {
    /// Drives the connection and returns the next event. Reconnects on the
    /// call after an error.
    async fn poll(&mut self) -> Result<TransportEvent, TransportError>;

    async fn subscribe(&mut self, topic_filter: &str) -> Result<(), TransportError>;

    /// Acknowledges a QoS 1 delivery. No-op for QoS 0.
    async fn acknowledge(&mut self, message: &InboundMessage) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}
