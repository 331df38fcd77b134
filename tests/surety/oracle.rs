use flightsurety::{
    SuretyErrorKind,
    ledger::Account,
    oracle::{INDEXES_PER_ORACLE, ResponseOutcome},
    types::{FlightKey, FlightStatusCode, UNIT_MICRO},
};

use crate::{DEPARTURE, GENESIS, fresh_engine, fund, oracles_holding, register_oracle};

fn engine_with_flight() -> flightsurety::FlightSurety {
    let mut engine = fresh_engine();
    fund(&mut engine, GENESIS);
    engine
        .register_flight(GENESIS, "ND1309", DEPARTURE)
        .expect("flight registration");
    engine
}

#[test]
fn given_fee_below_minimum_when_registering_oracle_then_insufficient_funds() {
    let mut engine = fresh_engine();
    engine.deposit("0xoracle", UNIT_MICRO).expect("deposit");
    let err = engine
        .register_oracle("0xoracle", UNIT_MICRO - 1)
        .expect_err("fee too low");
    assert_eq!(err.kind, SuretyErrorKind::InsufficientFunds);
    assert_eq!(engine.oracles().oracle_count(), 0);
}

#[test]
fn given_registered_oracle_when_registering_again_then_already_exists() {
    let mut engine = fresh_engine();
    register_oracle(&mut engine, "0xoracle");
    engine.deposit("0xoracle", UNIT_MICRO).expect("deposit");
    let err = engine
        .register_oracle("0xoracle", UNIT_MICRO)
        .expect_err("duplicate registration");
    assert_eq!(err.kind, SuretyErrorKind::AlreadyExists);
    assert_eq!(engine.balance_of(&Account::OracleFees), UNIT_MICRO);
}

#[test]
fn given_many_oracles_when_registered_then_indexes_are_distinct_and_in_range() {
    let mut engine = fresh_engine();
    let range = engine.policy().consensus.index_range;
    for n in 0..20 {
        let id = format!("0xoracle{n}");
        register_oracle(&mut engine, &id);
        let indexes = engine.get_my_indexes(&id).expect("indexes");
        assert_eq!(indexes.len(), INDEXES_PER_ORACLE);
        assert!(indexes.iter().all(|index| *index < range));
        assert_ne!(indexes[0], indexes[1]);
        assert_ne!(indexes[0], indexes[2]);
        assert_ne!(indexes[1], indexes[2]);
    }
    assert_eq!(engine.balance_of(&Account::OracleFees), 20 * UNIT_MICRO);
}

#[test]
fn given_unknown_identity_when_reading_indexes_then_not_found() {
    let engine = fresh_engine();
    let err = engine.get_my_indexes("0xnobody").expect_err("not an oracle");
    assert_eq!(err.kind, SuretyErrorKind::NotFound);
}

#[test]
fn given_oracle_without_index_when_responding_then_index_mismatch() {
    let mut engine = engine_with_flight();
    register_oracle(&mut engine, "0xoracle");
    let indexes = engine.get_my_indexes("0xoracle").expect("indexes");
    let foreign = (0..engine.policy().consensus.index_range)
        .find(|index| !indexes.contains(index))
        .expect("range is wider than three");

    let err = engine
        .submit_oracle_response("0xoracle", foreign, GENESIS, "ND1309", DEPARTURE, 20)
        .expect_err("foreign index must fail");
    assert_eq!(err.kind, SuretyErrorKind::IndexMismatch);
}

#[test]
fn given_non_oracle_when_responding_then_unauthorized() {
    let mut engine = engine_with_flight();
    let err = engine
        .submit_oracle_response("0xnobody", 0, GENESIS, "ND1309", DEPARTURE, 20)
        .expect_err("only oracles respond");
    assert_eq!(err.kind, SuretyErrorKind::Unauthorized);
}

#[test]
fn given_unknown_status_code_when_responding_then_invalid_request() {
    let mut engine = engine_with_flight();
    register_oracle(&mut engine, "0xoracle");
    let index = engine.get_my_indexes("0xoracle").expect("indexes")[0];
    let err = engine
        .submit_oracle_response("0xoracle", index, GENESIS, "ND1309", DEPARTURE, 25)
        .expect_err("25 is not a status code");
    assert_eq!(err.kind, SuretyErrorKind::InvalidRequest);
}

#[test]
fn given_oracle_that_already_answered_when_answering_again_then_duplicate_response() {
    let mut engine = engine_with_flight();
    let holders = oracles_holding(&mut engine, 4, 1);
    engine
        .submit_oracle_response(&holders[0], 4, GENESIS, "ND1309", DEPARTURE, 20)
        .expect("first answer");

    let err = engine
        .submit_oracle_response(&holders[0], 4, GENESIS, "ND1309", DEPARTURE, 10)
        .expect_err("second answer with any code must fail");
    assert_eq!(err.kind, SuretyErrorKind::DuplicateResponse);
}

#[test]
fn given_split_answers_when_no_code_reaches_quorum_then_flight_stays_open() {
    let mut engine = engine_with_flight();
    let holders = oracles_holding(&mut engine, 2, 4);
    for (oracle, code) in holders.iter().zip([20u8, 20, 10, 10]) {
        let outcome = engine
            .submit_oracle_response(oracle, 2, GENESIS, "ND1309", DEPARTURE, code)
            .expect("answer should be recorded");
        assert!(matches!(outcome, ResponseOutcome::Recorded { .. }));
    }
    assert_eq!(engine.view_flight_status("ND1309", GENESIS), None);
}

#[test]
fn given_third_matching_answer_when_submitted_then_flight_finalizes_and_late_answers_are_ignored() {
    let mut engine = engine_with_flight();
    let holders = oracles_holding(&mut engine, 7, 4);

    let mut outcomes = Vec::new();
    for oracle in &holders[..3] {
        outcomes.push(
            engine
                .submit_oracle_response(oracle, 7, GENESIS, "ND1309", DEPARTURE, 20)
                .expect("answer"),
        );
    }
    assert!(matches!(
        outcomes[1],
        ResponseOutcome::Recorded { responses: 2, .. }
    ));
    assert!(matches!(
        outcomes[2],
        ResponseOutcome::Finalized {
            status_code: FlightStatusCode::LateAirline,
            ..
        }
    ));

    let late = engine
        .submit_oracle_response(&holders[3], 7, GENESIS, "ND1309", DEPARTURE, 10)
        .expect("late answer is not an error");
    assert_eq!(
        late,
        ResponseOutcome::Ignored {
            resolved: FlightStatusCode::LateAirline
        }
    );
    assert_eq!(
        engine.view_flight_status("ND1309", GENESIS),
        Some(FlightStatusCode::LateAirline)
    );
}

#[test]
fn given_second_round_reaching_quorum_after_finalization_then_status_is_not_rewritten() {
    let mut engine = engine_with_flight();
    let first = oracles_holding(&mut engine, 1, 3);
    for oracle in &first[..3] {
        engine
            .submit_oracle_response(oracle, 1, GENESIS, "ND1309", DEPARTURE, 10)
            .expect("first round");
    }

    let second = oracles_holding(&mut engine, 8, 3);
    let mut last = None;
    for oracle in &second[..3] {
        last = Some(
            engine
                .submit_oracle_response(oracle, 8, GENESIS, "ND1309", DEPARTURE, 20)
                .expect("second round"),
        );
    }

    assert_eq!(
        last,
        Some(ResponseOutcome::Resolved {
            status_code: FlightStatusCode::LateAirline
        })
    );
    assert_eq!(
        engine.view_flight_status("ND1309", GENESIS),
        Some(FlightStatusCode::OnTime)
    );
}

#[test]
fn given_status_request_when_opened_then_index_is_in_range_and_recorded() {
    let mut engine = engine_with_flight();
    let request = engine
        .request_flight_status("0xp", GENESIS, "ND1309", DEPARTURE)
        .expect("request");
    assert!(request.key.index < engine.policy().consensus.index_range);
    assert_eq!(engine.oracles().requests().len(), 1);
    assert_eq!(engine.oracles().requests()[0], request);
}

#[test]
fn given_unmatched_round_timestamp_when_rounds_repeat_then_one_flight_is_finalized() {
    let mut engine = fresh_engine();
    fund(&mut engine, GENESIS);
    for departure in [100, 200] {
        engine
            .register_flight(GENESIS, "ND1309", departure)
            .expect("flight registration");
    }

    let first = oracles_holding(&mut engine, 2, 3);
    let mut last = None;
    for oracle in &first[..3] {
        last = Some(
            engine
                .submit_oracle_response(oracle, 2, GENESIS, "ND1309", 999, 20)
                .expect("first round"),
        );
    }
    let resolved = FlightKey::new(GENESIS, "ND1309", 200);
    assert_eq!(
        last,
        Some(ResponseOutcome::Finalized {
            flight: resolved.clone(),
            status_code: FlightStatusCode::LateAirline
        })
    );
    assert_eq!(
        engine.flights().round_alias(&FlightKey::new(GENESIS, "ND1309", 999)),
        Some(&resolved)
    );

    let second = oracles_holding(&mut engine, 6, 3);
    for oracle in &second[..3] {
        last = Some(
            engine
                .submit_oracle_response(oracle, 6, GENESIS, "ND1309", 999, 20)
                .expect("second round"),
        );
    }
    assert_eq!(
        last,
        Some(ResponseOutcome::Resolved {
            status_code: FlightStatusCode::LateAirline
        })
    );
    let earlier = engine
        .flights()
        .get(&FlightKey::new(GENESIS, "ND1309", 100))
        .expect("earlier departure");
    assert!(!earlier.finalized);
    assert_eq!(earlier.status_code, None);
}
