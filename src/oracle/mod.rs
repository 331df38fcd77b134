pub mod agents;
pub mod consensus;
pub mod indexes;
pub mod types;

pub use agents::{
    AgentReport, FixedStatusSource, HashedStatusSource, OracleAgent, OracleAgentPool,
    StatusSourcePort,
};
pub use consensus::{ConsensusRules, OracleConsensus};
pub use indexes::IndexGenerator;
pub use types::{
    INDEXES_PER_ORACLE, Oracle, OracleIndexes, ResponseKey, ResponseOutcome, ResponseTally,
    StatusRequest,
};
