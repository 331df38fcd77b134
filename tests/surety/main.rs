mod flight;
mod guard;
mod oracle;
mod scenario;
mod server;

use std::sync::{Arc, Mutex};

use flightsurety::{
    FlightSurety, GenesisAirline, SuretyPolicy,
    events::{EventSink, SuretyEvent},
    types::{Timestamp, UNIT_MICRO},
};

pub const OWNER: &str = "0xowner";
pub const GENESIS: &str = "0xairline1";
pub const DEPARTURE: Timestamp = 1_700_000_000;

#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<SuretyEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<SuretyEvent> {
        self.events.lock().expect("sink lock").clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(SuretyEvent::name).collect()
    }

    pub fn clear(&self) {
        self.events.lock().expect("sink lock").clear();
    }
}

impl EventSink for RecordingEventSink {
    fn publish(&self, event: &SuretyEvent) {
        self.events.lock().expect("sink lock").push(event.clone());
    }
}

pub fn genesis() -> GenesisAirline {
    GenesisAirline {
        id: GENESIS.to_string(),
        name: "Genesis Air".to_string(),
    }
}

pub fn engine_with_sink() -> (FlightSurety, Arc<RecordingEventSink>) {
    let sink = Arc::new(RecordingEventSink::default());
    let engine = FlightSurety::new(SuretyPolicy::default(), OWNER, &genesis(), sink.clone())
        .expect("engine should build");
    (engine, sink)
}

pub fn fresh_engine() -> FlightSurety {
    engine_with_sink().0
}

/// Deposits the minimum stake and funds `airline`, which must be admitted.
pub fn fund(engine: &mut FlightSurety, airline: &str) {
    let stake = engine.policy().economics.min_funds_micro;
    engine.deposit(airline, stake).expect("deposit should succeed");
    engine
        .fund_airline(airline, stake)
        .expect("funding should succeed");
}

/// Genesis plus `extra` bootstrap airlines, all active.
pub fn active_airlines(engine: &mut FlightSurety, extra: usize) -> Vec<String> {
    fund(engine, GENESIS);
    let mut airlines = vec![GENESIS.to_string()];
    for n in 2..=extra + 1 {
        let id = format!("0xairline{n}");
        engine
            .apply_airline(GENESIS, &id, &format!("Airline {n}"))
            .expect("bootstrap application should succeed");
        fund(engine, &id);
        airlines.push(id);
    }
    airlines
}

pub fn register_oracle(engine: &mut FlightSurety, id: &str) {
    engine.deposit(id, UNIT_MICRO).expect("deposit should succeed");
    engine
        .register_oracle(id, UNIT_MICRO)
        .expect("oracle registration should succeed");
}

/// Registers oracles until at least `min` of them hold `index`, returning
/// the ones that do.
pub fn oracles_holding(engine: &mut FlightSurety, index: u8, min: usize) -> Vec<String> {
    let mut holders: Vec<String> = engine
        .oracles()
        .oracles()
        .filter(|oracle| oracle.holds(index))
        .map(|oracle| oracle.id.clone())
        .collect();
    let mut n = engine.oracles().oracle_count();
    while holders.len() < min {
        n += 1;
        assert!(n < 500, "index {index} should eventually be assigned");
        let id = format!("0xoracle{n}");
        register_oracle(engine, &id);
        let indexes = engine.get_my_indexes(&id).expect("indexes");
        if indexes.contains(&index) {
            holders.push(id);
        }
    }
    holders
}

/// Drives a full oracle round for the flight and returns the responders.
pub fn finalize_flight(
    engine: &mut FlightSurety,
    airline: &str,
    flight_code: &str,
    status_code: u8,
) -> Vec<String> {
    let request = engine
        .request_flight_status("0xrequester", airline, flight_code, DEPARTURE)
        .expect("status request should succeed");
    let quorum = engine.policy().consensus.min_responses;
    let holders = oracles_holding(engine, request.key.index, quorum);
    for oracle in holders.iter().take(quorum) {
        engine
            .submit_oracle_response(
                oracle,
                request.key.index,
                airline,
                flight_code,
                DEPARTURE,
                status_code,
            )
            .expect("oracle response should be accepted");
    }
    holders
}
