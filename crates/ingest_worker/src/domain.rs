mod location_codec;
mod location_ingestion_service;
mod message_handler;
mod owntracks_topic;
mod session_state;
mod subscriber_config;

pub use location_codec::*;
pub use location_ingestion_service::*;
pub use message_handler::*;
pub use owntracks_topic::*;
pub use session_state::*;
pub use subscriber_config::*;
