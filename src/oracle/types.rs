use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{FlightKey, FlightStatusCode, Identity};

pub const INDEXES_PER_ORACLE: usize = 3;

pub type OracleIndexes = [u8; INDEXES_PER_ORACLE];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub id: Identity,
    pub indexes: OracleIndexes,
    pub registration_seq: u64,
}

impl Oracle {
    pub fn holds(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// Identifies one oracle round: a request index plus the flight it asks about.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResponseKey {
    pub index: u8,
    pub flight: FlightKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseTally {
    pub key: ResponseKey,
    #[serde(default)]
    pub responses: BTreeMap<FlightStatusCode, BTreeSet<Identity>>,
    #[serde(default)]
    pub resolved: Option<FlightStatusCode>,
}

impl ResponseTally {
    pub fn new(key: ResponseKey) -> Self {
        Self {
            key,
            responses: BTreeMap::new(),
            resolved: None,
        }
    }

    pub fn has_responded(&self, oracle: &str) -> bool {
        self.responses
            .values()
            .any(|responders| responders.contains(oracle))
    }

    pub fn count_for(&self, status_code: FlightStatusCode) -> usize {
        self.responses
            .get(&status_code)
            .map(BTreeSet::len)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest {
    pub key: ResponseKey,
    pub requester: Identity,
    pub request_seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResponseOutcome {
    /// Counted; quorum not reached yet.
    Recorded {
        status_code: FlightStatusCode,
        responses: usize,
    },
    /// This response completed quorum and resolved the flight.
    Finalized {
        flight: FlightKey,
        status_code: FlightStatusCode,
    },
    /// Quorum reached on this round, but the flight had already been
    /// resolved through another round.
    Resolved { status_code: FlightStatusCode },
    /// Round already resolved; late response dropped.
    Ignored { resolved: FlightStatusCode },
}
