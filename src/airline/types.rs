use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Identity, Micro};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AirlineStatus {
    Applied,
    Registered,
    Active,
}

impl AirlineStatus {
    /// Registered or Active: the airline has been admitted to the network.
    pub fn is_admitted(self) -> bool {
        matches!(self, AirlineStatus::Registered | AirlineStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    pub id: Identity,
    pub name: String,
    pub status: AirlineStatus,
    #[serde(default)]
    pub sponsor: Option<Identity>,
    #[serde(default)]
    pub votes: BTreeSet<Identity>,
    #[serde(default)]
    pub funded_micro: Micro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub votes: usize,
    pub required: usize,
    pub admitted: bool,
}
