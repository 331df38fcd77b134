use std::{collections::BTreeMap, ops::RangeInclusive};

use serde::{Deserialize, Serialize};

use crate::{
    airline::AirlineRegistry,
    error::{SuretyError, already_finalized, invalid_request, not_found, sponsor_not_active},
    flight::types::Flight,
    types::{FlightKey, FlightStatusCode, Timestamp},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FlightRegistryState", into = "FlightRegistryState")]
pub struct FlightRegistry {
    flights: Vec<Flight>,
    index: BTreeMap<FlightKey, usize>,
    /// Round keys that matched no departure, mapped to the flight they resolved.
    round_aliases: BTreeMap<FlightKey, FlightKey>,
}

/// Persisted form; the lookup index is rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FlightRegistryState {
    flights: Vec<Flight>,
    #[serde(default)]
    round_aliases: Vec<RoundAlias>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoundAlias {
    round: FlightKey,
    flight: FlightKey,
}

impl From<FlightRegistryState> for FlightRegistry {
    fn from(state: FlightRegistryState) -> Self {
        let index = state
            .flights
            .iter()
            .enumerate()
            .map(|(slot, flight)| (flight.key.clone(), slot))
            .collect();
        let round_aliases = state
            .round_aliases
            .into_iter()
            .map(|alias| (alias.round, alias.flight))
            .collect();
        Self {
            flights: state.flights,
            index,
            round_aliases,
        }
    }
}

impl From<FlightRegistry> for FlightRegistryState {
    fn from(registry: FlightRegistry) -> Self {
        Self {
            flights: registry.flights,
            round_aliases: registry
                .round_aliases
                .into_iter()
                .map(|(round, flight)| RoundAlias { round, flight })
                .collect(),
        }
    }
}

impl FlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &FlightKey) -> Option<&Flight> {
        self.index.get(key).map(|slot| &self.flights[*slot])
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    /// Returns `false` when the exact flight was already registered.
    pub fn register_flight(
        &mut self,
        airlines: &AirlineRegistry,
        airline: &str,
        flight_code: &str,
        departure_timestamp: Timestamp,
    ) -> Result<bool, SuretyError> {
        if !airlines.is_active(airline) {
            return Err(sponsor_not_active(format!(
                "airline '{airline}' must be active to register flights"
            )));
        }
        if flight_code.trim().is_empty() {
            return Err(invalid_request("flight code cannot be empty"));
        }

        let key = FlightKey::new(airline, flight_code, departure_timestamp);
        if self.index.contains_key(&key) {
            return Ok(false);
        }
        self.index.insert(key.clone(), self.flights.len());
        self.flights.push(Flight::new(key));
        Ok(true)
    }

    pub fn has_route(&self, airline: &str, flight_code: &str) -> bool {
        self.index
            .range(route_range(airline, flight_code))
            .next()
            .is_some()
    }

    pub fn has_flight_code(&self, flight_code: &str) -> bool {
        self.flights
            .iter()
            .any(|flight| flight.key.flight_code == flight_code)
    }

    /// The single airline with an unresolved flight under `flight_code`, if
    /// exactly one exists.
    pub fn sole_open_airline(&self, flight_code: &str) -> Option<&str> {
        let mut open = self
            .flights
            .iter()
            .filter(|flight| flight.key.flight_code == flight_code && !flight.finalized)
            .map(|flight| flight.key.airline.as_str());
        let first = open.next()?;
        open.all(|airline| airline == first).then_some(first)
    }

    /// True when every registered flight carrying `flight_code` is resolved.
    pub fn is_flight_code_settled(&self, flight_code: &str) -> bool {
        let mut carrying = self
            .flights
            .iter()
            .filter(|flight| flight.key.flight_code == flight_code)
            .peekable();
        carrying.peek().is_some() && carrying.all(|flight| flight.finalized)
    }

    /// Most recent resolved status for the airline's flight code.
    pub fn view_status(&self, flight_code: &str, airline: &str) -> Option<FlightStatusCode> {
        self.index
            .range(route_range(airline, flight_code))
            .rev()
            .map(|(_, slot)| &self.flights[*slot])
            .find(|flight| flight.finalized)
            .and_then(|flight| flight.status_code)
    }

    /// The flight a round key finalized when it matched no departure.
    pub fn round_alias(&self, round: &FlightKey) -> Option<&FlightKey> {
        self.round_aliases.get(round)
    }

    /// Records the quorum status. An oracle round may carry a timestamp that
    /// differs from the registered departure; it then resolves the latest
    /// pending flight of the same airline and code, once per round key.
    pub(crate) fn finalize_status(
        &mut self,
        round: &FlightKey,
        status_code: FlightStatusCode,
    ) -> Result<FlightKey, SuretyError> {
        let slot = self.resolve_pending(round)?;
        let flight = &mut self.flights[slot];
        flight.status_code = Some(status_code);
        flight.finalized = true;
        let resolved = flight.key.clone();
        if resolved != *round {
            self.round_aliases.insert(round.clone(), resolved.clone());
        }
        Ok(resolved)
    }

    fn resolve_pending(&self, round: &FlightKey) -> Result<usize, SuretyError> {
        if let Some(slot) = self.index.get(round) {
            if self.flights[*slot].finalized {
                return Err(already_finalized(format!(
                    "flight {round} status is already final"
                )));
            }
            return Ok(*slot);
        }
        if let Some(resolved) = self.round_aliases.get(round) {
            return Err(already_finalized(format!(
                "round {round} already finalized flight {resolved}"
            )));
        }

        let mut candidates = self
            .index
            .range(route_range(&round.airline, &round.flight_code))
            .map(|(_, slot)| *slot)
            .peekable();
        if candidates.peek().is_none() {
            return Err(not_found(format!(
                "no flight '{}' registered for airline '{}'",
                round.flight_code, round.airline
            )));
        }

        candidates
            .filter(|slot| !self.flights[*slot].finalized)
            .last()
            .ok_or_else(|| {
                already_finalized(format!(
                    "every flight '{}' of airline '{}' is already final",
                    round.flight_code, round.airline
                ))
            })
    }
}

fn route_range(airline: &str, flight_code: &str) -> RangeInclusive<FlightKey> {
    FlightKey::new(airline, flight_code, Timestamp::MIN)
        ..=FlightKey::new(airline, flight_code, Timestamp::MAX)
}
