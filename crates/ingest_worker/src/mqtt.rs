mod rumqttc_transport;
mod subscriber;
mod transport;

pub use rumqttc_transport::{parse_broker_url, RumqttcTransport};
pub use subscriber::LocationSubscriber;
pub use transport::{SessionTransport, TransportError, TransportEvent};
