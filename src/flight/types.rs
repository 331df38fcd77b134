use serde::{Deserialize, Serialize};

use crate::types::{FlightKey, FlightStatusCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub key: FlightKey,
    #[serde(default)]
    pub status_code: Option<FlightStatusCode>,
    #[serde(default)]
    pub finalized: bool,
}

impl Flight {
    pub fn new(key: FlightKey) -> Self {
        Self {
            key,
            status_code: None,
            finalized: false,
        }
    }
}
