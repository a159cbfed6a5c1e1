mod in_memory_location_repository;
mod location;
mod result;

pub use in_memory_location_repository::*;
pub use location::*;
pub use result::*;
