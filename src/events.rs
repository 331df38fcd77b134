use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{
    airline::AirlineStatus,
    oracle::OracleIndexes,
    types::{FlightCode, FlightKey, FlightStatusCode, Identity, Micro},
};

/// Notifications for external observers. Published after a transition has
/// committed; nothing inside the engine reacts to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SuretyEvent {
    OperationalStatusChanged {
        operational: bool,
    },
    CallerAuthorized {
        caller: Identity,
    },
    CallerDeauthorized {
        caller: Identity,
    },
    FundsDeposited {
        owner: Identity,
        amount_micro: Micro,
    },
    AirlineApplied {
        airline: Identity,
        sponsor: Identity,
        status: AirlineStatus,
    },
    AirlineVoted {
        airline: Identity,
        voter: Identity,
        votes: usize,
        required: usize,
    },
    AirlineRegistered {
        airline: Identity,
    },
    AirlineFunded {
        airline: Identity,
        amount_micro: Micro,
    },
    FlightRegistered {
        flight: FlightKey,
    },
    OracleRegistered {
        oracle: Identity,
        indexes: OracleIndexes,
    },
    StatusRequested {
        index: u8,
        flight: FlightKey,
        requester: Identity,
    },
    OracleReported {
        oracle: Identity,
        index: u8,
        flight: FlightKey,
        status_code: FlightStatusCode,
    },
    FlightStatusFinalized {
        flight: FlightKey,
        status_code: FlightStatusCode,
    },
    InsurancePurchased {
        passenger: Identity,
        flight_code: FlightCode,
        amount_micro: Micro,
    },
    PassengerCredited {
        passenger: Identity,
        flight_code: FlightCode,
        credit_micro: Micro,
    },
    CreditWithdrawn {
        passenger: Identity,
        amount_micro: Micro,
    },
}

impl SuretyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SuretyEvent::OperationalStatusChanged { .. } => "operational_status_changed",
            SuretyEvent::CallerAuthorized { .. } => "caller_authorized",
            SuretyEvent::CallerDeauthorized { .. } => "caller_deauthorized",
            SuretyEvent::FundsDeposited { .. } => "funds_deposited",
            SuretyEvent::AirlineApplied { .. } => "airline_applied",
            SuretyEvent::AirlineVoted { .. } => "airline_voted",
            SuretyEvent::AirlineRegistered { .. } => "airline_registered",
            SuretyEvent::AirlineFunded { .. } => "airline_funded",
            SuretyEvent::FlightRegistered { .. } => "flight_registered",
            SuretyEvent::OracleRegistered { .. } => "oracle_registered",
            SuretyEvent::StatusRequested { .. } => "status_requested",
            SuretyEvent::OracleReported { .. } => "oracle_reported",
            SuretyEvent::FlightStatusFinalized { .. } => "flight_status_finalized",
            SuretyEvent::InsurancePurchased { .. } => "insurance_purchased",
            SuretyEvent::PassengerCredited { .. } => "passenger_credited",
            SuretyEvent::CreditWithdrawn { .. } => "credit_withdrawn",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &SuretyEvent);
}

#[derive(Debug, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: &SuretyEvent) {}
}

#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &SuretyEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => {
                tracing::info!(target: "events", event = event.name(), payload = %payload, "surety_event")
            }
            Err(err) => {
                tracing::warn!(target: "events", event = event.name(), error = %err, "surety_event_unserializable")
            }
        }
    }
}

/// Fans events out to in-process subscribers such as oracle agents and
/// socket clients. Lagging receivers lose the oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<SuretyEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SuretyEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: &SuretyEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
    }
}

#[derive(Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutEventSink {
    fn publish(&self, event: &SuretyEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}
