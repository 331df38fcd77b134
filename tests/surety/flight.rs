use flightsurety::{SuretyErrorKind, events::SuretyEvent, types::FlightKey};

use crate::{DEPARTURE, GENESIS, engine_with_sink, finalize_flight, fresh_engine, fund};

#[test]
fn given_registered_only_airline_when_registering_flight_then_rejected() {
    let mut engine = fresh_engine();
    let err = engine
        .register_flight(GENESIS, "ND1309", DEPARTURE)
        .expect_err("unfunded airline cannot register flights");
    assert_eq!(err.kind, SuretyErrorKind::SponsorNotActive);
    assert!(engine.flights().flights().is_empty());
}

#[test]
fn given_same_flight_twice_when_registering_then_second_is_a_noop() {
    let (mut engine, sink) = engine_with_sink();
    fund(&mut engine, GENESIS);
    sink.clear();

    assert!(engine.register_flight(GENESIS, "ND1309", DEPARTURE).expect("first"));
    assert!(!engine.register_flight(GENESIS, "ND1309", DEPARTURE).expect("second"));

    assert_eq!(engine.flights().flights().len(), 1);
    assert_eq!(
        sink.events(),
        vec![SuretyEvent::FlightRegistered {
            flight: FlightKey::new(GENESIS, "ND1309", DEPARTURE),
        }]
    );
}

#[test]
fn given_unresolved_flight_when_viewing_status_then_none() {
    let mut engine = fresh_engine();
    fund(&mut engine, GENESIS);
    engine
        .register_flight(GENESIS, "ND1309", DEPARTURE)
        .expect("registration");
    assert_eq!(engine.view_flight_status("ND1309", GENESIS), None);
    assert_eq!(engine.view_flight_status("XX0000", GENESIS), None);
}

#[test]
fn given_unknown_flight_when_requesting_status_then_not_found() {
    let mut engine = fresh_engine();
    fund(&mut engine, GENESIS);
    let err = engine
        .request_flight_status("0xp", GENESIS, "ND1309", DEPARTURE)
        .expect_err("no such flight");
    assert_eq!(err.kind, SuretyErrorKind::NotFound);
}

#[test]
fn given_quorum_when_finalized_then_status_is_visible_and_final() {
    let mut engine = fresh_engine();
    fund(&mut engine, GENESIS);
    engine
        .register_flight(GENESIS, "ND1309", DEPARTURE)
        .expect("registration");

    finalize_flight(&mut engine, GENESIS, "ND1309", 10);

    let status = engine
        .view_flight_status("ND1309", GENESIS)
        .expect("status should be final");
    assert_eq!(status.code(), 10);
    let flight = engine
        .flights()
        .get(&FlightKey::new(GENESIS, "ND1309", DEPARTURE))
        .expect("flight exists");
    assert!(flight.finalized);
}
