pub mod registry;
pub mod types;

pub use registry::FlightRegistry;
pub use types::Flight;
