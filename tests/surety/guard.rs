use flightsurety::{SuretyErrorKind, events::SuretyEvent, ledger::Account};

use crate::{DEPARTURE, GENESIS, OWNER, engine_with_sink, fresh_engine, fund, oracles_holding};

#[test]
fn given_non_owner_when_toggling_operational_then_unauthorized() {
    let mut engine = fresh_engine();
    let err = engine
        .set_operational_status(GENESIS, false)
        .expect_err("only the owner may pause");
    assert_eq!(err.kind, SuretyErrorKind::Unauthorized);
    assert!(engine.is_operational());
}

#[test]
fn given_paused_system_when_mutating_then_system_paused_and_state_unchanged() {
    let (mut engine, sink) = engine_with_sink();
    engine.deposit(GENESIS, 50_000_000).expect("deposit");
    engine
        .set_operational_status(OWNER, false)
        .expect("owner may pause");
    sink.clear();

    let stake = engine.policy().economics.min_funds_micro;
    let errors = [
        engine.fund_airline(GENESIS, stake).expect_err("paused"),
        engine.deposit(GENESIS, 1).expect_err("paused"),
        engine
            .register_oracle("0xoracle", 1_000_000)
            .expect_err("paused"),
        engine.buy_insurance("0xp", "ND1309", 1).expect_err("paused"),
        engine.withdraw_credit("0xp").expect_err("paused"),
    ];
    for err in errors {
        assert_eq!(err.kind, SuretyErrorKind::SystemPaused);
    }

    assert!(!engine.is_airline_active(GENESIS));
    assert_eq!(engine.balance_of(&Account::wallet(GENESIS)), 50_000_000);
    assert!(sink.events().is_empty());
}

#[test]
fn given_paused_system_when_governing_or_reporting_then_system_paused_and_state_unchanged() {
    let (mut engine, sink) = engine_with_sink();
    fund(&mut engine, GENESIS);
    engine
        .apply_airline(GENESIS, "0xairline2", "Second Air")
        .expect("bootstrap admission");
    engine
        .register_flight(GENESIS, "ND1309", DEPARTURE)
        .expect("flight");
    let oracle = oracles_holding(&mut engine, 0, 1).remove(0);
    engine
        .request_flight_status("0xp", GENESIS, "ND1309", DEPARTURE)
        .expect("open round");
    let before = engine.snapshot();
    engine
        .set_operational_status(OWNER, false)
        .expect("owner may pause");
    sink.clear();

    let errors = [
        engine
            .apply_airline(GENESIS, "0xairline3", "Third Air")
            .expect_err("paused"),
        engine
            .submit_airline_vote(GENESIS, "0xairline2")
            .expect_err("paused"),
        engine
            .register_flight(GENESIS, "ND1310", DEPARTURE)
            .expect_err("paused"),
        engine
            .request_flight_status("0xp", GENESIS, "ND1309", DEPARTURE)
            .map(|_| ())
            .expect_err("paused"),
        engine
            .submit_oracle_response(&oracle, 0, GENESIS, "ND1309", DEPARTURE, 20)
            .map(|_| ())
            .expect_err("paused"),
    ];
    for err in errors {
        assert_eq!(err.kind, SuretyErrorKind::SystemPaused);
    }

    assert!(sink.events().is_empty());
    assert!(engine.airlines().get("0xairline3").is_none());
    assert_eq!(engine.flights().flights().len(), 1);
    assert_eq!(engine.oracles().requests().len(), 1);
    assert_eq!(engine.oracles(), &before.oracles);
}

#[test]
fn given_paused_system_when_owner_resumes_then_calls_succeed_again() {
    let (mut engine, sink) = engine_with_sink();
    engine.set_operational_status(OWNER, false).expect("pause");
    engine.set_operational_status(OWNER, false).expect("idempotent pause");
    engine.set_operational_status(OWNER, true).expect("resume");

    fund(&mut engine, GENESIS);
    assert!(engine.is_airline_active(GENESIS));

    let toggles: Vec<_> = sink
        .events()
        .into_iter()
        .filter(|event| matches!(event, SuretyEvent::OperationalStatusChanged { .. }))
        .collect();
    assert_eq!(
        toggles,
        vec![
            SuretyEvent::OperationalStatusChanged { operational: false },
            SuretyEvent::OperationalStatusChanged { operational: true },
        ]
    );
}

#[test]
fn given_non_owner_when_authorizing_callers_then_unauthorized() {
    let mut engine = fresh_engine();
    let err = engine
        .authorize_caller(GENESIS, "0xapp")
        .expect_err("only the owner authorizes");
    assert_eq!(err.kind, SuretyErrorKind::Unauthorized);
    assert!(!engine.is_authorized_caller("0xapp"));

    engine.authorize_caller(OWNER, "0xapp").expect("owner authorizes");
    assert!(engine.is_authorized_caller("0xapp"));
    engine.deauthorize_caller(OWNER, "0xapp").expect("owner revokes");
    assert!(!engine.is_authorized_caller("0xapp"));
}

#[test]
fn given_stranger_when_withdrawing_for_passenger_then_unauthorized() {
    let mut engine = fresh_engine();
    let err = engine
        .withdraw_credit_for("0xstranger", "0xp")
        .expect_err("stranger may not withdraw for others");
    assert_eq!(err.kind, SuretyErrorKind::Unauthorized);
}
