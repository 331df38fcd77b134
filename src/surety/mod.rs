pub mod engine;
pub mod persistence;
pub mod policy;

pub use engine::{FlightSurety, GenesisAirline, SuretySnapshot};
pub use persistence::SnapshotStore;
pub use policy::{ConsensusSettings, EconomicTerms, SuretyPolicy};
