use crate::domain::parse_owntracks_topic;
use common::domain::{DomainError, DomainResult};
use serde::Deserialize;

/// The only `_type` tag that is stored
pub const LOCATION_TYPE: &str = "location";

/// Location report as published by an OwnTracks client.
///
/// Extra fields in the payload (accuracy, altitude, tracker id, ...) are
/// ignored. Battery and velocity are optional on the wire and default to 0.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationEvent {
    #[serde(rename = "batt", default)]
    pub battery: i32,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    #[serde(rename = "tst")]
    pub timestamp: i64,
    #[serde(rename = "vel", default)]
    pub velocity: i32,
}

#[derive(Debug, Deserialize)]
struct MessageKind {
    #[serde(rename = "_type")]
    kind: String,
}

/// Result of decoding one inbound publish
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Location {
        user: String,
        device: String,
        event: LocationEvent,
    },
    /// Well-formed message with a tag other than `location`
    Ignored { kind: String },
}

/// Decode a raw publish into a location event and its owning user.
///
/// The payload is checked before the topic: a non-location message is
/// `Ignored` even when its topic would not parse.
///
/// # Errors
/// `PayloadDecodeError` when the body is not a tagged JSON object or a
/// location body lacks required fields; `InvalidTopic` when a location
/// arrives on a topic without a user segment.
pub fn decode_message(topic: &str, payload: &[u8]) -> DomainResult<DecodedMessage> {
    let MessageKind { kind } = serde_json::from_slice(payload)
        .map_err(|e| DomainError::PayloadDecodeError(e.to_string()))?;

    if kind != LOCATION_TYPE {
        return Ok(DecodedMessage::Ignored { kind });
    }

    let event: LocationEvent = serde_json::from_slice(payload)
        .map_err(|e| DomainError::PayloadDecodeError(e.to_string()))?;

    let parsed = parse_owntracks_topic(topic)?;

    Ok(DecodedMessage::Location {
        user: parsed.user,
        device: parsed.device,
        event,
    })
}
