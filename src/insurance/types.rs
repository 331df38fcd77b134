use serde::{Deserialize, Serialize};

use crate::types::{FlightCode, FlightKey, Identity, Micro};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePurchase {
    pub passenger: Identity,
    pub flight_code: FlightCode,
    /// The operating airline when only one had the code open at purchase.
    #[serde(default)]
    pub airline: Option<Identity>,
    pub amount_paid_micro: Micro,
    #[serde(default)]
    pub credit_owed_micro: Micro,
    /// Set once the insured flight resolves, whatever the status.
    #[serde(default)]
    pub settled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerCredit {
    pub passenger: Identity,
    pub flight_code: FlightCode,
    pub credit_micro: Micro,
}

impl InsurancePurchase {
    /// Whether resolving `flight` settles this purchase.
    pub fn covers(&self, flight: &FlightKey) -> bool {
        self.flight_code == flight.flight_code
            && self
                .airline
                .as_ref()
                .is_none_or(|airline| *airline == flight.airline)
    }
}
