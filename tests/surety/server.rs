use std::{fs, path::PathBuf, sync::Arc, time::Duration};

use flightsurety::{
    config::Config,
    events::NoopEventSink,
    ledger::Account,
    protocol::{SuretyCall, SuretyRequest, parse_request},
    server::{self, EngineHost},
};
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
};
use uuid::Uuid;

use crate::{GENESIS, OWNER};

fn work_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("flightsurety-server-test-{}", Uuid::now_v7()));
    fs::create_dir_all(&dir).expect("work dir");
    dir
}

fn config_in(dir: &PathBuf, extra: Value) -> Config {
    let mut value = json!({
        "owner": OWNER,
        "genesis_airline": { "id": GENESIS, "name": "Genesis Air" },
        "socket_path": dir.join("fs.sock"),
        "state_path": dir.join("state/flightsurety.json"),
        "genesis_balances": { GENESIS: 20_000_000u64, "0xp": 3_000_000u64 },
    });
    if let (Some(target), Value::Object(extra)) = (value.as_object_mut(), extra) {
        target.extend(extra);
    }
    serde_json::from_value(value).expect("config should deserialize")
}

fn request(id: u64, caller: &str, call: SuretyCall) -> SuretyRequest {
    SuretyRequest {
        id,
        caller: caller.to_string(),
        call,
    }
}

#[test]
fn given_fresh_state_when_host_opens_then_genesis_balances_are_credited_and_persisted() {
    let dir = work_dir();
    let config = config_in(&dir, json!({}));

    let host = EngineHost::open(&config, Arc::new(NoopEventSink)).expect("host opens");
    assert_eq!(
        host.engine().balance_of(&Account::wallet("0xp")),
        3_000_000
    );
    assert!(config.state_path.exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn given_mutations_when_host_reopens_then_state_survives_restart() {
    let dir = work_dir();
    let config = config_in(&dir, json!({}));

    {
        let mut host = EngineHost::open(&config, Arc::new(NoopEventSink)).expect("host opens");
        let reply = host.handle(&request(
            1,
            GENESIS,
            SuretyCall::FundAirline {
                amount_micro: 10_000_000,
            },
        ));
        assert!(reply.response.ok, "funding failed: {:?}", reply.response);
        assert!(!reply.stop);
    }

    let host = EngineHost::open(&config, Arc::new(NoopEventSink)).expect("host reopens");
    assert!(host.engine().is_airline_active(GENESIS));
    // Genesis balances are only credited once.
    assert_eq!(
        host.engine().balance_of(&Account::wallet(GENESIS)),
        10_000_000
    );

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn given_rejected_call_when_handled_then_failure_carries_kind_and_id() {
    let dir = work_dir();
    let config = config_in(&dir, json!({}));
    let mut host = EngineHost::open(&config, Arc::new(NoopEventSink)).expect("host opens");

    let reply = host.handle(&request(
        42,
        GENESIS,
        SuretyCall::SetOperationalStatus { operational: false },
    ));

    assert!(!reply.response.ok);
    assert_eq!(reply.response.id, Some(42));
    let error = reply.response.error.expect("error present");
    assert_eq!(
        serde_json::to_value(error.kind).expect("kind"),
        json!("unauthorized")
    );
    assert!(host.engine().is_operational());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn given_owner_shutdown_when_handled_then_host_asks_to_stop() {
    let dir = work_dir();
    let config = config_in(&dir, json!({}));
    let mut host = EngineHost::open(&config, Arc::new(NoopEventSink)).expect("host opens");

    assert!(!host.handle(&request(1, GENESIS, SuretyCall::Shutdown)).stop);
    assert!(host.handle(&request(2, OWNER, SuretyCall::Shutdown)).stop);

    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn given_running_daemon_when_client_sends_ndjson_then_responses_arrive_in_order() {
    let dir = work_dir();
    let config = config_in(&dir, json!({ "simulated_oracles": { "count": 12 } }));
    let socket_path = config.socket_path.clone();
    let state_path = config.state_path.clone();
    let daemon = tokio::spawn(server::run(config));

    let mut stream = None;
    for _ in 0..100 {
        if let Ok(connected) = UnixStream::connect(&socket_path).await {
            stream = Some(connected);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let stream = stream.expect("daemon should accept connections");
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    let script = [
        json!({"id": 1, "caller": GENESIS, "call": {"method": "fund_airline", "amount_micro": 10_000_000u64}}),
        json!({"id": 2, "caller": "0xp", "call": {"method": "get_credit"}}),
        json!({"id": 3, "caller": "0xp", "call": {"method": "mint"}}),
        json!({"id": 4, "caller": OWNER, "call": {"method": "shutdown"}}),
    ];
    let mut responses = Vec::new();
    for line in &script {
        writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("write request");
        let reply = lines
            .next_line()
            .await
            .expect("read response")
            .expect("daemon should answer");
        responses.push(serde_json::from_str::<Value>(&reply).expect("response is json"));
    }

    assert_eq!(responses[0]["ok"], json!(true));
    assert_eq!(responses[0]["result"], json!(true));
    assert_eq!(responses[1]["result"], json!(0));
    assert_eq!(responses[2]["ok"], json!(false));
    assert_eq!(responses[2]["id"], Value::Null);
    assert_eq!(responses[2]["error"]["kind"], json!("invalid_request"));
    assert_eq!(responses[3]["result"], json!({"stopping": true}));

    daemon
        .await
        .expect("daemon task joins")
        .expect("daemon stops cleanly");
    assert!(!socket_path.exists());
    let state = fs::read_to_string(&state_path).expect("state written");
    assert!(state.contains("oracle-12"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn given_request_line_when_parsed_then_round_trips_through_wire_format() {
    let line = json!({
        "id": 5,
        "caller": "0xoracle",
        "call": {
            "method": "submit_oracle_response",
            "index": 3,
            "airline": GENESIS,
            "flight_code": "ND1309",
            "timestamp": 1_700_000_000u64,
            "status_code": 20
        }
    })
    .to_string();
    let parsed = parse_request(&line).expect("parse");
    assert_eq!(
        serde_json::to_value(&parsed).expect("encode"),
        serde_json::from_str::<Value>(&line).expect("decode")
    );
}
