mod http;
mod tracks_api;

pub use http::*;
pub use tracks_api::*;
