use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSubscriberConfig {
    /// Broker address: `mqtt://host:port`, `tcp://host:port` or `host[:port]`
    pub broker_url: String,

    /// Stable client id; the broker keys the persistent session on it
    pub client_id: String,

    pub username: Option<String>,
    pub password: Option<String>,

    /// Subscription filter covering every user's location topic
    pub topic_filter: String,

    pub keep_alive_secs: u64,

    /// How long the broker keeps the session and queues messages while we
    /// are disconnected
    pub session_expiry_secs: u32,

    /// First delay before reconnecting after a fault, doubled per attempt
    pub reconnect_delay_ms: u64,

    pub max_reconnect_delay_ms: u64,

    /// Capacity of the client request channel
    pub request_capacity: usize,

    /// Upper bound on waiting for the session to close on shutdown
    pub shutdown_timeout_secs: u64,
}

impl Default for LocationSubscriberConfig {
    fn default() -> Self {
        Self {
            broker_url: "mqtt://localhost:1883".to_string(),
            client_id: "waypoint-ingest".to_string(),
            username: None,
            password: None,
            topic_filter: "owntracks/+/+".to_string(),
            keep_alive_secs: 20,
            session_expiry_secs: 60,
            reconnect_delay_ms: 1_000,
            max_reconnect_delay_ms: 30_000,
            request_capacity: 100,
            shutdown_timeout_secs: 10,
        }
    }
}

impl LocationSubscriberConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Delay to use after `current`, capped at the configured maximum
    pub fn next_reconnect_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_reconnect_delay())
    }
}
