use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    airline::types::{Airline, AirlineStatus, VoteTally},
    error::{
        SuretyError, already_exists, duplicate_vote, insufficient_funds, invalid_request,
        invalid_state, not_found, sponsor_not_active,
    },
    ledger::{Account, Ledger, LedgerEntryId},
    types::{Identity, Micro},
};

/// Append-only airline registry. Airlines live in an arena in application
/// order; `index` maps identities to arena slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Airline>", into = "Vec<Airline>")]
pub struct AirlineRegistry {
    airlines: Vec<Airline>,
    index: BTreeMap<Identity, usize>,
}

impl From<Vec<Airline>> for AirlineRegistry {
    fn from(airlines: Vec<Airline>) -> Self {
        let index = airlines
            .iter()
            .enumerate()
            .map(|(slot, airline)| (airline.id.clone(), slot))
            .collect();
        Self { airlines, index }
    }
}

impl From<AirlineRegistry> for Vec<Airline> {
    fn from(registry: AirlineRegistry) -> Self {
        registry.airlines
    }
}

impl AirlineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Airline> {
        self.index.get(id).map(|slot| &self.airlines[*slot])
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.get(id)
            .is_some_and(|airline| airline.status == AirlineStatus::Active)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.get(id).is_some_and(|airline| airline.status.is_admitted())
    }

    pub fn list_airlines(&self) -> &[Airline] {
        &self.airlines
    }

    pub fn airline_count(&self) -> usize {
        self.airlines.len()
    }

    pub fn active_count(&self) -> usize {
        self.airlines
            .iter()
            .filter(|airline| airline.status == AirlineStatus::Active)
            .count()
    }

    pub fn admitted_count(&self) -> usize {
        self.airlines
            .iter()
            .filter(|airline| airline.status.is_admitted())
            .count()
    }

    /// Votes needed to admit a pending airline right now: half of the
    /// currently active airlines, rounded up.
    pub fn required_votes(&self) -> usize {
        self.active_count().div_ceil(2)
    }

    /// Seeds the first airline, admitted without a sponsor.
    pub fn register_genesis(&mut self, id: &str, name: &str) -> Result<(), SuretyError> {
        if !self.airlines.is_empty() {
            return Err(invalid_state(
                "genesis airline can only be registered into an empty registry",
            ));
        }
        self.insert(Airline {
            id: id.to_string(),
            name: name.to_string(),
            status: AirlineStatus::Registered,
            sponsor: None,
            votes: BTreeSet::new(),
            funded_micro: 0,
        })
    }

    pub fn apply(
        &mut self,
        candidate: &str,
        name: &str,
        sponsor: &str,
        bootstrap_limit: usize,
    ) -> Result<AirlineStatus, SuretyError> {
        if !self.is_active(sponsor) {
            return Err(sponsor_not_active(format!(
                "sponsor '{sponsor}' is not an active airline"
            )));
        }
        if name.trim().is_empty() {
            return Err(invalid_request("airline name cannot be empty"));
        }

        let status = if self.admitted_count() < bootstrap_limit {
            AirlineStatus::Registered
        } else {
            AirlineStatus::Applied
        };

        self.insert(Airline {
            id: candidate.to_string(),
            name: name.trim().to_string(),
            status,
            sponsor: Some(sponsor.to_string()),
            votes: BTreeSet::new(),
            funded_micro: 0,
        })?;
        Ok(status)
    }

    pub fn submit_vote(&mut self, candidate: &str, voter: &str) -> Result<VoteTally, SuretyError> {
        if !self.is_active(voter) {
            return Err(sponsor_not_active(format!(
                "voter '{voter}' is not an active airline"
            )));
        }

        // Threshold is taken at vote time, not frozen at application.
        let required = self.required_votes();
        let airline = self.get_mut(candidate)?;
        if airline.status != AirlineStatus::Applied {
            return Err(invalid_state(format!(
                "airline '{candidate}' is not awaiting votes (status {:?})",
                airline.status
            )));
        }
        if airline.votes.contains(voter) {
            return Err(duplicate_vote(format!(
                "'{voter}' already voted for '{candidate}'"
            )));
        }

        airline.votes.insert(voter.to_string());
        let votes = airline.votes.len();
        let admitted = votes >= required;
        if admitted {
            airline.status = AirlineStatus::Registered;
        }

        Ok(VoteTally {
            votes,
            required,
            admitted,
        })
    }

    pub fn fund(
        &mut self,
        airline_id: &str,
        amount_micro: Micro,
        min_funds_micro: Micro,
        ledger: &mut Ledger,
    ) -> Result<LedgerEntryId, SuretyError> {
        let airline = self.get(airline_id).ok_or_else(|| unknown_airline(airline_id))?;
        match airline.status {
            AirlineStatus::Registered => {}
            AirlineStatus::Applied => {
                return Err(invalid_state(format!(
                    "airline '{airline_id}' has not been admitted yet"
                )));
            }
            AirlineStatus::Active => {
                return Err(invalid_state(format!(
                    "airline '{airline_id}' is already active"
                )));
            }
        }
        if amount_micro < min_funds_micro {
            return Err(insufficient_funds(format!(
                "funding of {amount_micro} is below the minimum of {min_funds_micro}"
            )));
        }

        let entry_id = ledger.transfer(
            &Account::wallet(airline_id),
            &Account::AirlineFunding,
            amount_micro,
            &format!("fund:{airline_id}"),
        )?;

        let airline = self.get_mut(airline_id)?;
        airline.status = AirlineStatus::Active;
        airline.funded_micro = amount_micro;
        Ok(entry_id)
    }

    fn insert(&mut self, airline: Airline) -> Result<(), SuretyError> {
        if airline.id.trim().is_empty() {
            return Err(invalid_request("airline identity cannot be empty"));
        }
        if self.index.contains_key(&airline.id) {
            return Err(already_exists(format!(
                "airline '{}' is already known",
                airline.id
            )));
        }
        self.index.insert(airline.id.clone(), self.airlines.len());
        self.airlines.push(airline);
        Ok(())
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Airline, SuretyError> {
        let slot = *self.index.get(id).ok_or_else(|| unknown_airline(id))?;
        Ok(&mut self.airlines[slot])
    }
}

fn unknown_airline(id: &str) -> SuretyError {
    not_found(format!("airline '{id}' is not known"))
}
