mod location_handler;
mod server;

pub use location_handler::*;
pub use server::*;
