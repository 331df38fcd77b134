pub mod airline;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod flight;
pub mod guard;
pub mod insurance;
pub mod ledger;
pub mod logging;
pub mod oracle;
pub mod protocol;
pub mod server;
pub mod surety;
pub mod types;

pub use error::{SuretyError, SuretyErrorKind};
pub use surety::{FlightSurety, GenesisAirline, SuretyPolicy};
