use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::{
    error::{SuretyError, internal_error},
    ledger::Account,
    surety::FlightSurety,
    types::{FlightCode, Identity, Micro, Timestamp},
};

/// One NDJSON request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuretyRequest {
    pub id: u64,
    pub caller: Identity,
    pub call: SuretyCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case", deny_unknown_fields)]
pub enum SuretyCall {
    IsOperational,
    SetOperationalStatus {
        operational: bool,
    },
    AuthorizeCaller {
        caller: Identity,
    },
    DeauthorizeCaller {
        caller: Identity,
    },
    Deposit {
        amount_micro: Micro,
    },
    BalanceOf {
        account: String,
    },
    ApplyAirline {
        candidate: Identity,
        name: String,
    },
    SubmitAirlineVote {
        candidate: Identity,
    },
    FundAirline {
        amount_micro: Micro,
    },
    IsAirlineActive {
        airline: Identity,
    },
    IsAirlineRegistered {
        airline: Identity,
    },
    ListAirlines,
    RegisterFlight {
        flight_code: FlightCode,
        timestamp: Timestamp,
    },
    ViewFlightStatus {
        flight_code: FlightCode,
        airline: Identity,
    },
    RequestFlightStatus {
        airline: Identity,
        flight_code: FlightCode,
        timestamp: Timestamp,
    },
    RegisterOracle {
        fee_micro: Micro,
    },
    GetMyIndexes,
    SubmitOracleResponse {
        index: u8,
        airline: Identity,
        flight_code: FlightCode,
        timestamp: Timestamp,
        status_code: u8,
    },
    BuyInsurance {
        flight_code: FlightCode,
        amount_micro: Micro,
    },
    GetCredit,
    IsPassenger {
        passenger: Identity,
    },
    WithdrawCredit,
    WithdrawCreditFor {
        passenger: Identity,
    },
    Shutdown,
}

impl SuretyCall {
    /// Whether a successful call changes engine state and must be persisted.
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            SuretyCall::IsOperational
                | SuretyCall::BalanceOf { .. }
                | SuretyCall::IsAirlineActive { .. }
                | SuretyCall::IsAirlineRegistered { .. }
                | SuretyCall::ListAirlines
                | SuretyCall::ViewFlightStatus { .. }
                | SuretyCall::GetMyIndexes
                | SuretyCall::GetCredit
                | SuretyCall::IsPassenger { .. }
                | SuretyCall::Shutdown
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuretyResponse {
    pub id: Option<u64>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SuretyError>,
}

impl SuretyResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<u64>, error: SuretyError) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(error),
        }
    }

    pub fn from_result(id: u64, result: Result<Value, SuretyError>) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(error) => Self::failure(Some(id), error),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed request: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("request {id} carries an empty caller identity")]
    EmptyCaller { id: u64 },
}

impl ProtocolError {
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ProtocolError::Malformed(_) => None,
            ProtocolError::EmptyCaller { id } => Some(*id),
        }
    }
}

impl From<ProtocolError> for SuretyError {
    fn from(err: ProtocolError) -> Self {
        crate::error::invalid_request(err.to_string())
    }
}

pub fn parse_request(line: &str) -> Result<SuretyRequest, ProtocolError> {
    let request: SuretyRequest = serde_json::from_str(line)?;
    if request.caller.trim().is_empty() {
        return Err(ProtocolError::EmptyCaller { id: request.id });
    }
    Ok(request)
}

/// Runs one call against the engine and renders its result as JSON.
/// `Shutdown` only checks that the caller may stop the daemon.
pub fn apply_call(
    engine: &mut FlightSurety,
    caller: &str,
    call: &SuretyCall,
) -> Result<Value, SuretyError> {
    match call {
        SuretyCall::IsOperational => Ok(json!(engine.is_operational())),
        SuretyCall::SetOperationalStatus { operational } => {
            engine.set_operational_status(caller, *operational)?;
            Ok(json!(engine.is_operational()))
        }
        SuretyCall::AuthorizeCaller { caller: target } => {
            engine.authorize_caller(caller, target)?;
            Ok(Value::Null)
        }
        SuretyCall::DeauthorizeCaller { caller: target } => {
            engine.deauthorize_caller(caller, target)?;
            Ok(Value::Null)
        }
        SuretyCall::Deposit { amount_micro } => {
            engine.deposit(caller, *amount_micro)?;
            Ok(json!(engine.balance_of(&Account::wallet(caller))))
        }
        SuretyCall::BalanceOf { account } => {
            let account = account
                .parse::<Account>()
                .unwrap_or_else(|_| Account::wallet(account.as_str()));
            Ok(json!(engine.balance_of(&account)))
        }
        SuretyCall::ApplyAirline { candidate, name } => {
            to_json(engine.apply_airline(caller, candidate, name)?)
        }
        SuretyCall::SubmitAirlineVote { candidate } => {
            to_json(engine.submit_airline_vote(caller, candidate)?)
        }
        SuretyCall::FundAirline { amount_micro } => {
            engine.fund_airline(caller, *amount_micro)?;
            Ok(json!(engine.is_airline_active(caller)))
        }
        SuretyCall::IsAirlineActive { airline } => Ok(json!(engine.is_airline_active(airline))),
        SuretyCall::IsAirlineRegistered { airline } => {
            Ok(json!(engine.is_airline_registered(airline)))
        }
        SuretyCall::ListAirlines => to_json(engine.list_airlines()),
        SuretyCall::RegisterFlight {
            flight_code,
            timestamp,
        } => Ok(json!({
            "created": engine.register_flight(caller, flight_code, *timestamp)?
        })),
        SuretyCall::ViewFlightStatus {
            flight_code,
            airline,
        } => Ok(json!(
            engine
                .view_flight_status(flight_code, airline)
                .map(|status| status.code())
        )),
        SuretyCall::RequestFlightStatus {
            airline,
            flight_code,
            timestamp,
        } => to_json(engine.request_flight_status(caller, airline, flight_code, *timestamp)?),
        SuretyCall::RegisterOracle { fee_micro } => {
            to_json(engine.register_oracle(caller, *fee_micro)?)
        }
        SuretyCall::GetMyIndexes => to_json(engine.get_my_indexes(caller)?),
        SuretyCall::SubmitOracleResponse {
            index,
            airline,
            flight_code,
            timestamp,
            status_code,
        } => to_json(engine.submit_oracle_response(
            caller,
            *index,
            airline,
            flight_code,
            *timestamp,
            *status_code,
        )?),
        SuretyCall::BuyInsurance {
            flight_code,
            amount_micro,
        } => {
            engine.buy_insurance(caller, flight_code, *amount_micro)?;
            Ok(Value::Null)
        }
        SuretyCall::GetCredit => Ok(json!(engine.get_credit(caller))),
        SuretyCall::IsPassenger { passenger } => Ok(json!(engine.is_passenger(passenger))),
        SuretyCall::WithdrawCredit => Ok(json!(engine.withdraw_credit(caller)?)),
        SuretyCall::WithdrawCreditFor { passenger } => {
            Ok(json!(engine.withdraw_credit_for(caller, passenger)?))
        }
        SuretyCall::Shutdown => {
            if engine.owner() != caller {
                return Err(crate::error::unauthorized(format!(
                    "'{caller}' may not shut the daemon down"
                )));
            }
            Ok(json!({ "stopping": true }))
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, SuretyError> {
    serde_json::to_value(value)
        .map_err(|err| internal_error(format!("failed to encode result: {err}")))
}
