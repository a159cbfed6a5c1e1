use crate::domain::{InboundMessage, LocationSubscriberConfig};
use crate::mqtt::{SessionTransport, TransportError, TransportEvent};
use async_trait::async_trait;
use common::domain::{DomainError, DomainResult};
use rumqttc::v5::mqttbytes::v5::{ConnectProperties, Packet, Publish};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, StateError};
use rumqttc::Outgoing;
use std::collections::HashMap;

const DEFAULT_MQTT_PORT: u16 = 1883;

/// MQTT v5 session backed by rumqttc.
///
/// Uses a fixed client id with `clean_start = false` and a session expiry
/// interval, so the broker queues QoS 1 messages while we are away.
/// Acknowledgements are manual: a publish is only acked once the handler is
/// done with it.
pub struct RumqttcTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    /// Deliveries awaiting ack, keyed by packet id
    pending_acks: HashMap<u16, Publish>,
}

impl RumqttcTransport {
    pub fn new(config: &LocationSubscriberConfig) -> DomainResult<Self> {
        let options = mqtt_options(config)?;
        let (client, eventloop) = AsyncClient::new(options, config.request_capacity);

        Ok(Self {
            client,
            eventloop,
            pending_acks: HashMap::new(),
        })
    }
}

fn mqtt_options(config: &LocationSubscriberConfig) -> DomainResult<MqttOptions> {
    let (host, port) = parse_broker_url(&config.broker_url)?;

    let mut options = MqttOptions::new(&config.client_id, host, port);
    // replaces all connect properties, so it goes first
    options.set_connect_properties(ConnectProperties {
        session_expiry_interval: Some(config.session_expiry_secs),
        ..ConnectProperties::new()
    });
    options.set_keep_alive(config.keep_alive());
    options.set_clean_start(false);
    options.set_manual_acks(true);

    match (&config.username, &config.password) {
        (Some(username), password) => {
            options.set_credentials(username, password.as_deref().unwrap_or_default());
        }
        (None, Some(_)) => {
            return Err(DomainError::InvalidConfiguration(
                "MQTT password set without a username".to_string(),
            ));
        }
        (None, None) => {}
    }

    Ok(options)
}

/// rumqttc reports a refused SUBACK and a server DISCONNECT as state errors
/// and drops the connection afterwards.
fn transport_error(err: ConnectionError) -> TransportError {
    match err {
        ConnectionError::MqttState(StateError::SubFail { reason }) => {
            TransportError::SubscriptionRefused(format!("{:?}", reason))
        }
        ConnectionError::MqttState(StateError::ServerDisconnect {
            reason_code,
            reason_string,
        }) => TransportError::ServerDisconnect(match reason_string {
            Some(detail) => format!("{:?}: {}", reason_code, detail),
            None => format!("{:?}", reason_code),
        }),
        other => TransportError::Connection(other.to_string()),
    }
}

#[async_trait]
impl SessionTransport for RumqttcTransport {
    async fn poll(&mut self) -> Result<TransportEvent, TransportError> {
        let event = self.eventloop.poll().await.map_err(transport_error)?;

        let event = match event {
            Event::Incoming(Packet::ConnAck(connack)) => {
                // packet ids from the previous connection are void; the broker
                // redelivers anything we did not ack
                self.pending_acks.clear();
                TransportEvent::ConnectionUp {
                    session_present: connack.session_present,
                }
            }
            Event::Incoming(Packet::Publish(publish)) => {
                let message = InboundMessage {
                    topic: String::from_utf8_lossy(&publish.topic).into_owned(),
                    payload: publish.payload.clone(),
                    packet_id: publish.pkid,
                };
                if publish.qos != QoS::AtMostOnce {
                    self.pending_acks.insert(publish.pkid, publish);
                }
                TransportEvent::Message(message)
            }
            // failure codes never get here, see transport_error
            Event::Incoming(Packet::SubAck(_)) => TransportEvent::Subscribed,
            Event::Outgoing(Outgoing::Disconnect) => TransportEvent::Closed,
            Event::Incoming(_) | Event::Outgoing(_) => TransportEvent::Idle,
        };

        Ok(event)
    }

    async fn subscribe(&mut self, topic_filter: &str) -> Result<(), TransportError> {
        self.client
            .subscribe(topic_filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Client(e.to_string()))
    }

    async fn acknowledge(&mut self, message: &InboundMessage) -> Result<(), TransportError> {
        let Some(publish) = self.pending_acks.remove(&message.packet_id) else {
            return Ok(());
        };

        self.client
            .ack(&publish)
            .await
            .map_err(|e| TransportError::Client(e.to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Client(e.to_string()))
    }
}

/// Parse broker URL in format mqtt://host:port, tcp://host:port or host[:port]
pub fn parse_broker_url(url: &str) -> DomainResult<(String, u16)> {
    let address = url
        .trim_start_matches("mqtt://")
        .trim_start_matches("tcp://")
        .trim_end_matches('/');

    let (host, port) = match address.split_once(':') {
        None => (address, DEFAULT_MQTT_PORT),
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                DomainError::InvalidConfiguration(format!("invalid port in broker URL: {}", url))
            })?;
            (host, port)
        }
    };

    if host.is_empty() {
        return Err(DomainError::InvalidConfiguration(format!(
            "missing host in broker URL: {}",
            url
        )));
    }

    Ok((host.to_string(), port))
}
