use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{
        SuretyError, SuretyErrorKind, already_exists, arithmetic_error, duplicate_response,
        index_mismatch, insufficient_funds, invalid_request, not_found, unauthorized,
    },
    flight::FlightRegistry,
    ledger::{Account, Ledger},
    oracle::{
        indexes::IndexGenerator,
        types::{Oracle, OracleIndexes, ResponseKey, ResponseOutcome, ResponseTally, StatusRequest},
    },
    types::{FlightKey, FlightStatusCode, Micro},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusRules {
    pub registration_fee_micro: Micro,
    pub min_responses: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleConsensus {
    oracles: BTreeMap<String, Oracle>,
    #[serde(default)]
    tallies: Vec<ResponseTally>,
    #[serde(skip)]
    tally_index: BTreeMap<ResponseKey, usize>,
    #[serde(default)]
    requests: Vec<StatusRequest>,
    #[serde(default)]
    next_registration_seq: u64,
    #[serde(default)]
    next_request_seq: u64,
}

impl OracleConsensus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds lookup tables skipped during serialization.
    pub fn reindex(&mut self) {
        self.tally_index = self
            .tallies
            .iter()
            .enumerate()
            .map(|(slot, tally)| (tally.key.clone(), slot))
            .collect();
    }

    pub fn oracle(&self, id: &str) -> Option<&Oracle> {
        self.oracles.get(id)
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    pub fn oracles(&self) -> impl Iterator<Item = &Oracle> {
        self.oracles.values()
    }

    pub fn tally(&self, key: &ResponseKey) -> Option<&ResponseTally> {
        self.tally_index.get(key).map(|slot| &self.tallies[*slot])
    }

    pub fn requests(&self) -> &[StatusRequest] {
        &self.requests
    }

    pub fn indexes_of(&self, id: &str) -> Result<OracleIndexes, SuretyError> {
        self.oracles
            .get(id)
            .map(|oracle| oracle.indexes)
            .ok_or_else(|| not_found(format!("'{id}' is not a registered oracle")))
    }

    pub fn register_oracle(
        &mut self,
        id: &str,
        fee_paid_micro: Micro,
        rules: &ConsensusRules,
        generator: &IndexGenerator,
        ledger: &mut Ledger,
    ) -> Result<OracleIndexes, SuretyError> {
        if id.trim().is_empty() {
            return Err(invalid_request("oracle identity cannot be empty"));
        }
        if self.oracles.contains_key(id) {
            return Err(already_exists(format!("oracle '{id}' is already registered")));
        }
        if fee_paid_micro < rules.registration_fee_micro {
            return Err(insufficient_funds(format!(
                "registration fee of {fee_paid_micro} is below the required {}",
                rules.registration_fee_micro
            )));
        }

        let registration_seq = self.next_registration_seq;
        let next_seq = registration_seq
            .checked_add(1)
            .ok_or_else(|| arithmetic_error("oracle registration sequence overflow"))?;
        ledger.transfer(
            &Account::wallet(id),
            &Account::OracleFees,
            fee_paid_micro,
            &format!("oracle_fee:{id}"),
        )?;

        let indexes = generator.assign(id, registration_seq);
        self.oracles.insert(
            id.to_string(),
            Oracle {
                id: id.to_string(),
                indexes,
                registration_seq,
            },
        );
        self.next_registration_seq = next_seq;
        Ok(indexes)
    }

    /// Opens a round for off-chain agents. Nothing waits on it: the round is
    /// pending until enough responses arrive, possibly forever.
    pub fn request_status(
        &mut self,
        requester: &str,
        flight: FlightKey,
        flights: &FlightRegistry,
        generator: &IndexGenerator,
    ) -> Result<StatusRequest, SuretyError> {
        if !flights.has_route(&flight.airline, &flight.flight_code) {
            return Err(not_found(format!(
                "no flight '{}' registered for airline '{}'",
                flight.flight_code, flight.airline
            )));
        }

        let request_seq = self.next_request_seq;
        self.next_request_seq = request_seq
            .checked_add(1)
            .ok_or_else(|| arithmetic_error("status request sequence overflow"))?;

        let request = StatusRequest {
            key: ResponseKey {
                index: generator.request_index(requester, request_seq),
                flight,
            },
            requester: requester.to_string(),
            request_seq,
        };
        self.requests.push(request.clone());
        Ok(request)
    }

    pub fn submit_response(
        &mut self,
        oracle_id: &str,
        key: ResponseKey,
        status_code: FlightStatusCode,
        rules: &ConsensusRules,
        flights: &mut FlightRegistry,
    ) -> Result<ResponseOutcome, SuretyError> {
        let oracle = self
            .oracles
            .get(oracle_id)
            .ok_or_else(|| unauthorized(format!("'{oracle_id}' is not a registered oracle")))?;
        if !oracle.holds(key.index) {
            return Err(index_mismatch(format!(
                "index {} is not assigned to oracle '{oracle_id}'",
                key.index
            )));
        }
        if !flights.has_route(&key.flight.airline, &key.flight.flight_code) {
            return Err(not_found(format!(
                "no flight '{}' registered for airline '{}'",
                key.flight.flight_code, key.flight.airline
            )));
        }

        let prior = self.tally(&key);
        if let Some(resolved) = prior.and_then(|tally| tally.resolved) {
            return Ok(ResponseOutcome::Ignored { resolved });
        }
        if prior.is_some_and(|tally| tally.has_responded(oracle_id)) {
            return Err(duplicate_response(format!(
                "oracle '{oracle_id}' already answered round {} for {}",
                key.index, key.flight
            )));
        }

        let responses = prior
            .map(|tally| tally.count_for(status_code))
            .unwrap_or(0)
            + 1;
        let quorum = responses >= rules.min_responses;

        // Resolve the flight before touching the tally so a failure leaves
        // the round exactly as it was.
        let outcome = if quorum {
            match flights.finalize_status(&key.flight, status_code) {
                Ok(flight) => ResponseOutcome::Finalized { flight, status_code },
                Err(err) if err.kind == SuretyErrorKind::AlreadyFinalized => {
                    ResponseOutcome::Resolved { status_code }
                }
                Err(err) => return Err(err),
            }
        } else {
            ResponseOutcome::Recorded {
                status_code,
                responses,
            }
        };

        let tally = self.tally_mut(key);
        tally
            .responses
            .entry(status_code)
            .or_default()
            .insert(oracle_id.to_string());
        if quorum {
            tally.resolved = Some(status_code);
        }
        Ok(outcome)
    }

    fn tally_mut(&mut self, key: ResponseKey) -> &mut ResponseTally {
        let slot = match self.tally_index.get(&key) {
            Some(slot) => *slot,
            None => {
                let slot = self.tallies.len();
                self.tally_index.insert(key.clone(), slot);
                self.tallies.push(ResponseTally::new(key));
                slot
            }
        };
        &mut self.tallies[slot]
    }
}
