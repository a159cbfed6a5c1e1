use crate::domain::{decode_message, DecodedMessage, InboundMessage, MessageHandler};
use async_trait::async_trait;
use common::domain::{
    CreateLocationPointInput, DomainError, LocationExistsInput, LocationPoint, LocationRepository,
};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Stored(LocationPoint),
    /// Already persisted under the same packet id or user/timestamp
    Duplicate,
    /// Not a location message
    Ignored,
    /// Undecodable payload or malformed topic
    Rejected,
    /// The store failed for a reason other than a duplicate
    Failed,
}

impl IngestOutcome {
    /// Always true. Every outcome is final for its message: a redelivered
    /// rejected payload is rejected again, and a failed insert is not retried
    /// through redelivery either.
    pub fn should_acknowledge(&self) -> bool {
        true
    }
}

/// Decodes inbound publishes and stores each location at most once.
///
/// Flow:
/// 1. Decode the payload and filter on the `location` tag
/// 2. Take the user from the topic
/// 3. Skip if a point with the same packet id, or user and timestamp, exists
/// 4. Insert; a uniqueness violation on insert also counts as a duplicate
///
/// Step 3 is a fast path. Two deliveries can both pass it concurrently, so
/// the store's unique constraints in step 4 decide.
pub struct LocationIngestionService {
    repository: Arc<dyn LocationRepository>,
}

impl LocationIngestionService {
    pub fn new(repository: Arc<dyn LocationRepository>) -> Self {
        Self { repository }
    }

    pub async fn ingest(&self, message: &InboundMessage) -> IngestOutcome {
        let (user, event) = match decode_message(&message.topic, &message.payload) {
            Ok(DecodedMessage::Location { user, device, event }) => {
                Span::current().record("user", user.as_str());
                debug!(device = %device, "decoded location event");
                (user, event)
            }
            Ok(DecodedMessage::Ignored { kind }) => {
                debug!(kind = %kind, "ignoring non-location message");
                return IngestOutcome::Ignored;
            }
            Err(e) => {
                warn!(error = %e, "dropping undecodable message");
                return IngestOutcome::Rejected;
            }
        };

        let candidate = CreateLocationPointInput {
            user,
            latitude: event.latitude,
            longitude: event.longitude,
            battery: event.battery,
            velocity: event.velocity,
            timestamp: event.timestamp,
            packet_id: message.packet_id,
        };

        match self
            .repository
            .location_exists(LocationExistsInput::from(&candidate))
            .await
        {
            Ok(true) => {
                debug!(timestamp = candidate.timestamp, "location already stored, skipping");
                return IngestOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "failed to check for existing location, dropping message");
                return IngestOutcome::Failed;
            }
        }

        info!(
            latitude = candidate.latitude,
            longitude = candidate.longitude,
            battery = candidate.battery,
            "storing location"
        );

        match self.repository.insert_location(candidate).await {
            Ok(point) => IngestOutcome::Stored(point),
            Err(DomainError::LocationAlreadyExists(constraint)) => {
                debug!(constraint = %constraint, "location stored concurrently, skipping");
                IngestOutcome::Duplicate
            }
            Err(e) => {
                error!(error = %e, "failed to store location, dropping message");
                IngestOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl MessageHandler for LocationIngestionService {
    /// Runs the pipeline for one message inside its own root span.
    async fn handle(&self, message: &InboundMessage) -> bool {
        let span = info_span!(
            parent: Span::none(),
            "mqtt_message",
            topic = %message.topic,
            packet_id = message.packet_id,
            payload_size = message.payload.len(),
            user = tracing::field::Empty,
        );

        self.ingest(message)
            .instrument(span)
            .await
            .should_acknowledge()
    }
}
