use std::{collections::BTreeSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    airline::{Airline, AirlineRegistry, AirlineStatus, VoteTally},
    error::{SuretyError, invalid_request, unauthorized},
    events::{EventSink, NoopEventSink, SuretyEvent},
    flight::FlightRegistry,
    guard::OperationalGuard,
    insurance::InsurancePolicy,
    ledger::{Account, Ledger},
    oracle::{IndexGenerator, OracleConsensus, OracleIndexes, ResponseKey, ResponseOutcome, StatusRequest},
    surety::policy::SuretyPolicy,
    types::{FlightKey, FlightStatusCode, Identity, Micro, Timestamp},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAirline {
    pub id: Identity,
    pub name: String,
}

/// Everything that must survive a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuretySnapshot {
    pub guard: OperationalGuard,
    #[serde(default)]
    pub authorized_callers: BTreeSet<Identity>,
    pub ledger: Ledger,
    pub airlines: AirlineRegistry,
    pub flights: FlightRegistry,
    pub oracles: OracleConsensus,
    pub insurance: InsurancePolicy,
}

/// The flight insurance state machine. Every call is a complete transition:
/// it validates, commits, then publishes events. A rejected call leaves the
/// state untouched.
pub struct FlightSurety {
    guard: OperationalGuard,
    authorized_callers: BTreeSet<Identity>,
    ledger: Ledger,
    airlines: AirlineRegistry,
    flights: FlightRegistry,
    oracles: OracleConsensus,
    insurance: InsurancePolicy,
    policy: SuretyPolicy,
    generator: IndexGenerator,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for FlightSurety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlightSurety")
            .field("owner", &self.guard.owner())
            .field("operational", &self.guard.is_operational())
            .field("airlines", &self.airlines.airline_count())
            .field("flights", &self.flights.flights().len())
            .field("oracles", &self.oracles.oracle_count())
            .finish_non_exhaustive()
    }
}

impl FlightSurety {
    pub fn new(
        policy: SuretyPolicy,
        owner: &str,
        genesis: &GenesisAirline,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, SuretyError> {
        if owner.trim().is_empty() {
            return Err(invalid_request("owner identity cannot be empty"));
        }
        let mut airlines = AirlineRegistry::new();
        airlines.register_genesis(&genesis.id, &genesis.name)?;

        Self::from_snapshot(
            policy,
            SuretySnapshot {
                guard: OperationalGuard::new(owner),
                authorized_callers: BTreeSet::new(),
                ledger: Ledger::new(),
                airlines,
                flights: FlightRegistry::new(),
                oracles: OracleConsensus::new(),
                insurance: InsurancePolicy::new(),
            },
            sink,
        )
    }

    pub fn from_snapshot(
        policy: SuretyPolicy,
        snapshot: SuretySnapshot,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, SuretyError> {
        policy.validate()?;
        let generator = policy.index_generator()?;
        let mut oracles = snapshot.oracles;
        oracles.reindex();

        Ok(Self {
            guard: snapshot.guard,
            authorized_callers: snapshot.authorized_callers,
            ledger: snapshot.ledger,
            airlines: snapshot.airlines,
            flights: snapshot.flights,
            oracles,
            insurance: snapshot.insurance,
            policy,
            generator,
            sink,
        })
    }

    pub fn with_defaults(owner: &str, genesis: &GenesisAirline) -> Result<Self, SuretyError> {
        Self::new(SuretyPolicy::default(), owner, genesis, Arc::new(NoopEventSink))
    }

    pub fn snapshot(&self) -> SuretySnapshot {
        SuretySnapshot {
            guard: self.guard.clone(),
            authorized_callers: self.authorized_callers.clone(),
            ledger: self.ledger.clone(),
            airlines: self.airlines.clone(),
            flights: self.flights.clone(),
            oracles: self.oracles.clone(),
            insurance: self.insurance.clone(),
        }
    }

    pub fn policy(&self) -> &SuretyPolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn airlines(&self) -> &AirlineRegistry {
        &self.airlines
    }

    pub fn flights(&self) -> &FlightRegistry {
        &self.flights
    }

    pub fn oracles(&self) -> &OracleConsensus {
        &self.oracles
    }

    pub fn insurance(&self) -> &InsurancePolicy {
        &self.insurance
    }

    // Operational control.

    pub fn owner(&self) -> &str {
        self.guard.owner()
    }

    pub fn is_operational(&self) -> bool {
        self.guard.is_operational()
    }

    pub fn set_operational_status(
        &mut self,
        caller: &str,
        operational: bool,
    ) -> Result<(), SuretyError> {
        if self.guard.set_operational_status(caller, operational)? {
            tracing::info!(target: "surety", operational, "operational_status_changed");
            self.publish(SuretyEvent::OperationalStatusChanged { operational });
        }
        Ok(())
    }

    pub fn is_authorized_caller(&self, caller: &str) -> bool {
        self.guard.is_owner(caller) || self.authorized_callers.contains(caller)
    }

    pub fn authorize_caller(&mut self, caller: &str, target: &str) -> Result<(), SuretyError> {
        self.guard.require_operational()?;
        self.guard.require_owner(caller)?;
        if target.trim().is_empty() {
            return Err(invalid_request("authorized caller identity cannot be empty"));
        }
        if self.authorized_callers.insert(target.to_string()) {
            self.publish(SuretyEvent::CallerAuthorized {
                caller: target.to_string(),
            });
        }
        Ok(())
    }

    pub fn deauthorize_caller(&mut self, caller: &str, target: &str) -> Result<(), SuretyError> {
        self.guard.require_operational()?;
        self.guard.require_owner(caller)?;
        if self.authorized_callers.remove(target) {
            self.publish(SuretyEvent::CallerDeauthorized {
                caller: target.to_string(),
            });
        }
        Ok(())
    }

    // Wallets.

    pub fn deposit(&mut self, caller: &str, amount_micro: Micro) -> Result<(), SuretyError> {
        self.guard.require_operational()?;
        if caller.trim().is_empty() {
            return Err(invalid_request("depositor identity cannot be empty"));
        }
        self.ledger
            .deposit(&Account::wallet(caller), amount_micro, &format!("deposit:{caller}"))?;
        self.publish(SuretyEvent::FundsDeposited {
            owner: caller.to_string(),
            amount_micro,
        });
        Ok(())
    }

    pub fn balance_of(&self, account: &Account) -> Micro {
        self.ledger.balance(account)
    }

    // Airlines.

    pub fn apply_airline(
        &mut self,
        caller: &str,
        candidate: &str,
        name: &str,
    ) -> Result<AirlineStatus, SuretyError> {
        self.guard.require_operational()?;
        let status = self.airlines.apply(
            candidate,
            name,
            caller,
            self.policy.economics.bootstrap_airline_limit,
        )?;

        tracing::info!(
            target: "surety",
            airline = %candidate,
            sponsor = %caller,
            status = ?status,
            "airline_applied"
        );
        self.publish(SuretyEvent::AirlineApplied {
            airline: candidate.to_string(),
            sponsor: caller.to_string(),
            status,
        });
        if status == AirlineStatus::Registered {
            self.publish(SuretyEvent::AirlineRegistered {
                airline: candidate.to_string(),
            });
        }
        Ok(status)
    }

    pub fn submit_airline_vote(
        &mut self,
        caller: &str,
        candidate: &str,
    ) -> Result<VoteTally, SuretyError> {
        self.guard.require_operational()?;
        let tally = self.airlines.submit_vote(candidate, caller)?;

        tracing::info!(
            target: "surety",
            airline = %candidate,
            voter = %caller,
            votes = tally.votes,
            required = tally.required,
            admitted = tally.admitted,
            "airline_vote_recorded"
        );
        self.publish(SuretyEvent::AirlineVoted {
            airline: candidate.to_string(),
            voter: caller.to_string(),
            votes: tally.votes,
            required: tally.required,
        });
        if tally.admitted {
            self.publish(SuretyEvent::AirlineRegistered {
                airline: candidate.to_string(),
            });
        }
        Ok(tally)
    }

    pub fn fund_airline(&mut self, caller: &str, amount_micro: Micro) -> Result<(), SuretyError> {
        self.guard.require_operational()?;
        self.airlines.fund(
            caller,
            amount_micro,
            self.policy.economics.min_funds_micro,
            &mut self.ledger,
        )?;

        tracing::info!(target: "surety", airline = %caller, amount_micro, "airline_funded");
        self.publish(SuretyEvent::AirlineFunded {
            airline: caller.to_string(),
            amount_micro,
        });
        Ok(())
    }

    pub fn is_airline_active(&self, airline: &str) -> bool {
        self.airlines.is_active(airline)
    }

    pub fn is_airline_registered(&self, airline: &str) -> bool {
        self.airlines.is_registered(airline)
    }

    pub fn list_airlines(&self) -> &[Airline] {
        self.airlines.list_airlines()
    }

    // Flights.

    pub fn register_flight(
        &mut self,
        caller: &str,
        flight_code: &str,
        timestamp: Timestamp,
    ) -> Result<bool, SuretyError> {
        self.guard.require_operational()?;
        let created = self
            .flights
            .register_flight(&self.airlines, caller, flight_code, timestamp)?;

        if created {
            let flight = FlightKey::new(caller, flight_code, timestamp);
            tracing::info!(target: "surety", flight = %flight, "flight_registered");
            self.publish(SuretyEvent::FlightRegistered { flight });
        }
        Ok(created)
    }

    pub fn view_flight_status(&self, flight_code: &str, airline: &str) -> Option<FlightStatusCode> {
        self.flights.view_status(flight_code, airline)
    }

    // Oracles.

    pub fn register_oracle(
        &mut self,
        caller: &str,
        fee_micro: Micro,
    ) -> Result<OracleIndexes, SuretyError> {
        self.guard.require_operational()?;
        let rules = self.policy.consensus_rules();
        let indexes = self.oracles.register_oracle(
            caller,
            fee_micro,
            &rules,
            &self.generator,
            &mut self.ledger,
        )?;

        tracing::info!(target: "surety", oracle = %caller, indexes = ?indexes, "oracle_registered");
        self.publish(SuretyEvent::OracleRegistered {
            oracle: caller.to_string(),
            indexes,
        });
        Ok(indexes)
    }

    pub fn get_my_indexes(&self, caller: &str) -> Result<OracleIndexes, SuretyError> {
        self.oracles.indexes_of(caller)
    }

    pub fn request_flight_status(
        &mut self,
        caller: &str,
        airline: &str,
        flight_code: &str,
        timestamp: Timestamp,
    ) -> Result<StatusRequest, SuretyError> {
        self.guard.require_operational()?;
        let request = self.oracles.request_status(
            caller,
            FlightKey::new(airline, flight_code, timestamp),
            &self.flights,
            &self.generator,
        )?;

        tracing::info!(
            target: "surety",
            index = request.key.index,
            flight = %request.key.flight,
            requester = %caller,
            "flight_status_requested"
        );
        self.publish(SuretyEvent::StatusRequested {
            index: request.key.index,
            flight: request.key.flight.clone(),
            requester: caller.to_string(),
        });
        Ok(request)
    }

    pub fn submit_oracle_response(
        &mut self,
        caller: &str,
        index: u8,
        airline: &str,
        flight_code: &str,
        timestamp: Timestamp,
        status_code: u8,
    ) -> Result<ResponseOutcome, SuretyError> {
        self.guard.require_operational()?;
        let status = FlightStatusCode::from_code(status_code)
            .ok_or_else(|| invalid_request(format!("unknown flight status code {status_code}")))?;
        let key = ResponseKey {
            index,
            flight: FlightKey::new(airline, flight_code, timestamp),
        };
        let rules = self.policy.consensus_rules();
        let outcome =
            self.oracles
                .submit_response(caller, key.clone(), status, &rules, &mut self.flights)?;

        let credits = match &outcome {
            ResponseOutcome::Finalized {
                flight,
                status_code,
            } => self.insurance.on_flight_finalized(
                flight,
                *status_code,
                &self.policy.insurance_terms(),
            )?,
            _ => Vec::new(),
        };

        match &outcome {
            ResponseOutcome::Ignored { resolved } => {
                tracing::debug!(
                    target: "surety",
                    oracle = %caller,
                    index,
                    flight = %key.flight,
                    resolved = %resolved,
                    "late_oracle_response_ignored"
                );
                return Ok(outcome);
            }
            ResponseOutcome::Recorded { responses, .. } => {
                tracing::debug!(
                    target: "surety",
                    oracle = %caller,
                    index,
                    flight = %key.flight,
                    status_code = %status,
                    responses = *responses,
                    "oracle_response_recorded"
                );
            }
            ResponseOutcome::Resolved { .. } => {
                tracing::debug!(
                    target: "surety",
                    index,
                    flight = %key.flight,
                    status_code = %status,
                    "oracle_round_resolved_after_flight_final"
                );
            }
            ResponseOutcome::Finalized { flight, .. } => {
                tracing::info!(
                    target: "surety",
                    flight = %flight,
                    status_code = %status,
                    credited = credits.len(),
                    "flight_status_finalized"
                );
            }
        }

        self.publish(SuretyEvent::OracleReported {
            oracle: caller.to_string(),
            index,
            flight: key.flight,
            status_code: status,
        });
        if let ResponseOutcome::Finalized {
            flight,
            status_code,
        } = &outcome
        {
            self.publish(SuretyEvent::FlightStatusFinalized {
                flight: flight.clone(),
                status_code: *status_code,
            });
        }
        for credit in credits {
            self.publish(SuretyEvent::PassengerCredited {
                passenger: credit.passenger,
                flight_code: credit.flight_code,
                credit_micro: credit.credit_micro,
            });
        }
        Ok(outcome)
    }

    // Insurance.

    pub fn buy_insurance(
        &mut self,
        caller: &str,
        flight_code: &str,
        amount_micro: Micro,
    ) -> Result<(), SuretyError> {
        self.guard.require_operational()?;
        self.insurance.buy(
            caller,
            flight_code,
            amount_micro,
            &self.policy.insurance_terms(),
            &self.flights,
            &mut self.ledger,
        )?;

        tracing::info!(
            target: "surety",
            passenger = %caller,
            flight_code = %flight_code,
            amount_micro,
            "insurance_purchased"
        );
        self.publish(SuretyEvent::InsurancePurchased {
            passenger: caller.to_string(),
            flight_code: flight_code.to_string(),
            amount_micro,
        });
        Ok(())
    }

    pub fn get_credit(&self, passenger: &str) -> Micro {
        self.insurance.credit_of(passenger)
    }

    pub fn is_passenger(&self, passenger: &str) -> bool {
        self.insurance.is_passenger(passenger)
    }

    pub fn withdraw_credit(&mut self, caller: &str) -> Result<Micro, SuretyError> {
        self.withdraw_credit_for(caller, caller)
    }

    /// Pays a passenger's credit into the passenger's own wallet. Anyone but
    /// the passenger needs to be an authorized caller.
    pub fn withdraw_credit_for(
        &mut self,
        caller: &str,
        passenger: &str,
    ) -> Result<Micro, SuretyError> {
        self.guard.require_operational()?;
        if caller != passenger && !self.is_authorized_caller(caller) {
            return Err(unauthorized(format!(
                "'{caller}' may not withdraw credit for '{passenger}'"
            )));
        }

        let amount_micro = match self.insurance.pay(passenger, &mut self.ledger) {
            Ok(amount_micro) => amount_micro,
            Err(err) => {
                tracing::warn!(
                    target: "surety",
                    passenger = %passenger,
                    error = %err,
                    "credit_withdrawal_failed"
                );
                return Err(err);
            }
        };

        tracing::info!(
            target: "surety",
            passenger = %passenger,
            amount_micro,
            "credit_withdrawn"
        );
        self.publish(SuretyEvent::CreditWithdrawn {
            passenger: passenger.to_string(),
            amount_micro,
        });
        Ok(amount_micro)
    }

    fn publish(&self, event: SuretyEvent) {
        self.sink.publish(&event);
    }
}
