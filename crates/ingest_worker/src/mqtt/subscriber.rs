use crate::domain::{
    InboundMessage, LocationSubscriberConfig, MessageHandler, SessionSignal, SessionState,
};
use crate::mqtt::{SessionTransport, TransportError, TransportEvent};
use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Owns the broker session for the lifetime of the process.
///
/// Subscribes on every connection, not only the first, since a broker may
/// drop the stored session and its subscriptions. Messages are handed to the
/// handler one at a time in delivery order and acknowledged once it returns
/// `true`.
///
/// An error before the first connection is fatal. After that, faults are
/// logged and the session reconnects with exponential backoff until the
/// cancellation token fires.
pub struct LocationSubscriber<T: SessionTransport> {
    transport: T,
    handler: Arc<dyn MessageHandler>,
    config: LocationSubscriberConfig,
    state: SessionState,
}

impl<T: SessionTransport> LocationSubscriber<T> {
    pub fn new(
        transport: T,
        handler: Arc<dyn MessageHandler>,
        config: LocationSubscriberConfig,
    ) -> Self {
        Self {
            transport,
            handler,
            config,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, signal: SessionSignal) {
        let next = self.state.on(signal);
        if next != self.state {
            debug!(from = ?self.state, to = ?next, ?signal, "session state changed");
        }
        self.state = next;
    }

    #[instrument(
        name = "mqtt_subscriber",
        skip_all,
        fields(
            client_id = %self.config.client_id,
            topic_filter = %self.config.topic_filter,
        )
    )]
    pub async fn run(&mut self, token: CancellationToken) -> anyhow::Result<()> {
        info!("starting MQTT subscriber");
        self.transition(SessionSignal::ConnectStarted);

        let mut connected_once = false;
        let mut reconnect_delay = self.config.reconnect_delay();

        loop {
            let polled = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("cancellation received");
                    break;
                }
                polled = self.transport.poll() => polled,
            };

            match polled {
                Ok(TransportEvent::ConnectionUp { session_present }) => {
                    self.transition(SessionSignal::ConnectionUp);
                    connected_once = true;
                    reconnect_delay = self.config.reconnect_delay();
                    info!(session_present, "connected to MQTT broker");

                    self.transport
                        .subscribe(&self.config.topic_filter)
                        .await
                        .context("failed to request subscription")?;
                    self.transition(SessionSignal::SubscribeRequested);
                }
                Ok(TransportEvent::Subscribed) => {
                    info!("subscribed to location topics");
                }
                Ok(TransportEvent::Message(message)) => {
                    self.dispatch(message).await;
                }
                Ok(TransportEvent::Closed | TransportEvent::Idle) => {}
                Err(e) if !connected_once => {
                    error!(error = %e, "initial connection to MQTT broker failed");
                    self.transition(SessionSignal::ShutdownRequested);
                    self.transition(SessionSignal::SessionClosed);
                    return Err(e).context("failed to establish MQTT session");
                }
                Err(e) => {
                    self.transition(SessionSignal::Fault);
                    let retry_in_ms = reconnect_delay.as_millis() as u64;
                    match &e {
                        TransportError::SubscriptionRefused(reason) => error!(
                            reason = %reason,
                            retry_in_ms,
                            "broker refused subscription, no messages will arrive until it is granted"
                        ),
                        TransportError::ServerDisconnect(reason) => warn!(
                            reason = %reason,
                            retry_in_ms,
                            "broker closed the session, reconnecting"
                        ),
                        _ => warn!(
                            error = %e,
                            retry_in_ms,
                            "MQTT connection lost, reconnecting"
                        ),
                    }

                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                    reconnect_delay = self.config.next_reconnect_delay(reconnect_delay);
                }
            }
        }

        self.shutdown().await;
        info!("MQTT subscriber stopped");
        Ok(())
    }

    async fn dispatch(&mut self, message: InboundMessage) {
        if !self.handler.handle(&message).await {
            debug!(
                packet_id = message.packet_id,
                "handler declined message, leaving it for redelivery"
            );
            return;
        }

        if let Err(e) = self.transport.acknowledge(&message).await {
            warn!(packet_id = message.packet_id, error = %e, "failed to acknowledge message");
        }
    }

    /// Disconnects and waits, bounded by the shutdown timeout, for the
    /// session to report closed. Messages arriving meanwhile stay unacked.
    async fn shutdown(&mut self) {
        self.transition(SessionSignal::ShutdownRequested);
        info!("disconnecting from MQTT broker");

        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "failed to request disconnect");
            self.transition(SessionSignal::SessionClosed);
            return;
        }

        let timeout = self.config.shutdown_timeout();
        let transport = &mut self.transport;
        let closed = tokio::time::timeout(timeout, async {
            loop {
                match transport.poll().await {
                    Ok(TransportEvent::Closed) => break,
                    Ok(TransportEvent::Message(message)) => {
                        debug!(
                            packet_id = message.packet_id,
                            "message arrived during shutdown, leaving it for redelivery"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "connection closed");
                        break;
                    }
                }
            }
        })
        .await;

        if closed.is_err() {
            warn!(timeout = ?timeout, "session did not close in time");
        }

        self.transition(SessionSignal::SessionClosed);
    }
}
