mod client;
mod config;
mod location_repository;
mod migration;

pub use client::*;
pub use config::*;
pub use location_repository::*;
pub use migration::*;
