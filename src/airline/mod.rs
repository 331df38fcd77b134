pub mod registry;
pub mod types;

pub use registry::AirlineRegistry;
pub use types::{Airline, AirlineStatus, VoteTally};
