use flightsurety::{
    airline::AirlineStatus,
    ledger::Account,
    oracle::ResponseOutcome,
    types::{FlightStatusCode, UNIT_MICRO},
};

use crate::{DEPARTURE, GENESIS, engine_with_sink, register_oracle};

const PASSENGER: &str = "0xpassenger";

#[test]
fn given_full_network_when_flight_is_late_by_airline_then_passenger_withdraws_one_and_a_half_units()
{
    let (mut engine, sink) = engine_with_sink();

    // Genesis funds itself and bootstraps three more airlines.
    crate::fund(&mut engine, GENESIS);
    for n in 2..=4 {
        let id = format!("0xairline{n}");
        let status = engine
            .apply_airline(GENESIS, &id, &format!("Airline {n}"))
            .expect("bootstrap application");
        assert_eq!(status, AirlineStatus::Registered);
        crate::fund(&mut engine, &id);
    }

    // The fifth needs two of the four active airlines.
    let status = engine
        .apply_airline("0xairline2", "0xairline5", "Airline 5")
        .expect("fifth application");
    assert_eq!(status, AirlineStatus::Applied);
    assert!(
        !engine
            .submit_airline_vote(GENESIS, "0xairline5")
            .expect("vote 1")
            .admitted
    );
    assert!(
        engine
            .submit_airline_vote("0xairline3", "0xairline5")
            .expect("vote 2")
            .admitted
    );
    assert!(engine.is_airline_registered("0xairline5"));

    for n in 1..=20 {
        register_oracle(&mut engine, &format!("0xoracle{n}"));
    }

    engine
        .register_flight(GENESIS, "ND1309", DEPARTURE)
        .expect("flight registration");
    engine.deposit(PASSENGER, UNIT_MICRO).expect("deposit");
    engine
        .buy_insurance(PASSENGER, "ND1309", UNIT_MICRO)
        .expect("purchase");
    assert!(engine.is_passenger(PASSENGER));
    assert_eq!(engine.balance_of(&Account::wallet(PASSENGER)), 0);

    // Keep asking until a round lands on an index that three oracles hold.
    let (index, responders) = (0..64)
        .find_map(|_| {
            let request = engine
                .request_flight_status(PASSENGER, GENESIS, "ND1309", DEPARTURE)
                .expect("status request");
            let responders: Vec<String> = engine
                .oracles()
                .oracles()
                .filter(|oracle| oracle.holds(request.key.index))
                .map(|oracle| oracle.id.clone())
                .collect();
            (responders.len() >= 3).then_some((request.key.index, responders))
        })
        .expect("some index is held by three of twenty oracles");

    let mut outcomes = Vec::new();
    for oracle in &responders[..3] {
        outcomes.push(
            engine
                .submit_oracle_response(oracle, index, GENESIS, "ND1309", DEPARTURE, 20)
                .expect("oracle response"),
        );
    }
    assert!(matches!(outcomes[2], ResponseOutcome::Finalized { .. }));
    assert_eq!(
        engine.view_flight_status("ND1309", GENESIS),
        Some(FlightStatusCode::LateAirline)
    );
    assert_eq!(engine.get_credit(PASSENGER), 1_500_000);

    let paid = engine.withdraw_credit(PASSENGER).expect("withdrawal");
    assert_eq!(paid, 1_500_000);
    assert_eq!(engine.get_credit(PASSENGER), 0);
    assert_eq!(engine.balance_of(&Account::wallet(PASSENGER)), 1_500_000);

    let names = sink.names();
    let position = |name: &str| {
        names
            .iter()
            .position(|candidate| *candidate == name)
            .unwrap_or_else(|| panic!("missing event {name}"))
    };
    assert!(position("flight_status_finalized") < position("passenger_credited"));
    assert!(position("passenger_credited") < position("credit_withdrawn"));
}
