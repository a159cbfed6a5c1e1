use common::domain::{DomainError, DomainResult};

/// Parsed OwnTracks topic
#[derive(Debug, Clone, PartialEq)]
pub struct OwnTracksTopic {
    pub namespace: String,
    pub user: String,
    pub device: String,
}

/// Parse an OwnTracks topic in the format `{namespace}/{user}/{device}`
///
/// # Examples
/// ```
/// use ingest_worker::parse_owntracks_topic;
///
/// let parsed = parse_owntracks_topic("owntracks/alice/phone1").unwrap();
/// assert_eq!(parsed.user, "alice");
/// assert_eq!(parsed.device, "phone1");
/// ```
pub fn parse_owntracks_topic(topic: &str) -> DomainResult<OwnTracksTopic> {
    let parts: Vec<&str> = topic.split('/').collect();

    let [namespace, user, device] = parts.as_slice() else {
        return Err(DomainError::InvalidTopic(format!(
            "Invalid topic format '{}': expected '{{namespace}}/{{user}}/{{device}}'",
            topic
        )));
    };

    if user.is_empty() {
        return Err(DomainError::InvalidTopic(format!(
            "User cannot be empty in topic '{}'",
            topic
        )));
    }

    if device.is_empty() {
        return Err(DomainError::InvalidTopic(format!(
            "Device cannot be empty in topic '{}'",
            topic
        )));
    }

    Ok(OwnTracksTopic {
        namespace: namespace.to_string(),
        user: user.to_string(),
        device: device.to_string(),
    })
}
