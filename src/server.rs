use std::{fs, io::ErrorKind, os::unix::fs::FileTypeExt, path::Path, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
    signal::unix::{SignalKind, signal},
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::SuretyError,
    events::{BroadcastEventSink, EventSink, FanoutEventSink, TracingEventSink},
    oracle::{
        AgentReport, FixedStatusSource, HashedStatusSource, OracleAgentPool, StatusSourcePort,
    },
    protocol::{SuretyCall, SuretyRequest, SuretyResponse, apply_call, parse_request},
    surety::{FlightSurety, SnapshotStore},
    types::FlightStatusCode,
};

const CALL_QUEUE_CAPACITY: usize = 64;
const REPORT_QUEUE_CAPACITY: usize = 256;

enum ExitReason {
    ShutdownCall,
    Signal(&'static str),
}

struct ClientCall {
    request: SuretyRequest,
    reply: oneshot::Sender<SuretyResponse>,
}

#[derive(Debug)]
pub struct HostReply {
    pub response: SuretyResponse,
    pub stop: bool,
}

/// Owns the engine and its snapshot store. Every request runs to completion
/// before the next one starts; successful mutations are persisted at once.
pub struct EngineHost {
    engine: FlightSurety,
    store: SnapshotStore,
}

impl EngineHost {
    /// Restores the engine from the snapshot at `config.state_path`, or
    /// creates a fresh one with the configured genesis balances.
    pub fn open(config: &Config, sink: Arc<dyn EventSink>) -> Result<Self> {
        let store = SnapshotStore::new(config.state_path.clone());
        let restored = store
            .load()
            .with_context(|| format!("failed to load state from {}", store.path().display()))?;

        let engine = match restored {
            Some(snapshot) => {
                let engine = FlightSurety::from_snapshot(config.policy(), snapshot, sink)
                    .map_err(|err| anyhow!("failed to restore engine: {err}"))?;
                tracing::info!(
                    target: "server",
                    state_path = %store.path().display(),
                    airlines = engine.airlines().airline_count(),
                    flights = engine.flights().flights().len(),
                    oracles = engine.oracles().oracle_count(),
                    "engine_restored"
                );
                engine
            }
            None => {
                let mut engine = FlightSurety::new(
                    config.policy(),
                    &config.owner,
                    &config.genesis_airline,
                    sink,
                )
                .map_err(|err| anyhow!("failed to create engine: {err}"))?;
                for (identity, amount_micro) in &config.genesis_balances {
                    if *amount_micro == 0 {
                        continue;
                    }
                    engine.deposit(identity, *amount_micro).map_err(|err| {
                        anyhow!("failed to credit genesis balance of '{identity}': {err}")
                    })?;
                }
                tracing::info!(
                    target: "server",
                    owner = %config.owner,
                    genesis_airline = %config.genesis_airline.id,
                    funded_wallets = config.genesis_balances.len(),
                    "engine_created"
                );
                engine
            }
        };

        let host = Self { engine, store };
        host.persist()
            .map_err(|err| anyhow!("failed to write initial state: {err}"))?;
        Ok(host)
    }

    pub fn engine(&self) -> &FlightSurety {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut FlightSurety {
        &mut self.engine
    }

    pub fn handle(&mut self, request: &SuretyRequest) -> HostReply {
        let result = apply_call(&mut self.engine, &request.caller, &request.call);
        let succeeded = result.is_ok();

        if succeeded && request.call.is_mutating() {
            self.persist_or_log();
        }
        if let Err(err) = &result {
            tracing::debug!(
                target: "server",
                request_id = request.id,
                caller = %request.caller,
                kind = ?err.kind,
                error = %err,
                "call_rejected"
            );
        }

        HostReply {
            stop: succeeded && matches!(request.call, SuretyCall::Shutdown),
            response: SuretyResponse::from_result(request.id, result),
        }
    }

    pub fn submit_report(&mut self, report: AgentReport) {
        let outcome = self.engine.submit_oracle_response(
            &report.oracle,
            report.index,
            &report.flight.airline,
            &report.flight.flight_code,
            report.flight.departure_timestamp,
            report.status_code.code(),
        );
        match outcome {
            Ok(_) => self.persist_or_log(),
            Err(err) => tracing::debug!(
                target: "server",
                oracle = %report.oracle,
                flight = %report.flight,
                error = %err,
                "agent_report_rejected"
            ),
        }
    }

    pub fn persist(&self) -> Result<(), SuretyError> {
        self.store.save(&self.engine.snapshot())
    }

    fn persist_or_log(&self) {
        // The transition has already committed in memory; the next save retries.
        if let Err(err) = self.persist() {
            tracing::error!(
                target: "server",
                state_path = %self.store.path().display(),
                error = %err,
                "state_persist_failed"
            );
        }
    }
}

pub async fn run(config: Config) -> Result<()> {
    let broadcast = BroadcastEventSink::new(config.simulated_oracles.event_capacity);
    let sinks: Vec<Arc<dyn EventSink>> =
        vec![Arc::new(TracingEventSink), Arc::new(broadcast.clone())];
    let sink = Arc::new(FanoutEventSink::new(sinks));
    let mut host = EngineHost::open(&config, sink)?;

    let cancel = CancellationToken::new();
    let (report_tx, mut report_rx) = mpsc::channel::<AgentReport>(REPORT_QUEUE_CAPACITY);
    let agents_task = if config.simulated_oracles.count > 0 {
        let agents = OracleAgentPool::enroll(
            host.engine_mut(),
            &config.simulated_oracles.id_prefix,
            config.simulated_oracles.count,
            config.economics.registration_fee_micro,
        )
        .map_err(|err| anyhow!("failed to enroll simulated oracles: {err}"))?;
        host.persist()
            .map_err(|err| anyhow!("failed to persist oracle enrollment: {err}"))?;

        let source = status_source(&config)?;
        let pool = OracleAgentPool::new(agents, source);
        Some(pool.spawn(broadcast.subscribe(), report_tx, cancel.clone()))
    } else {
        drop(report_tx);
        None
    };

    prepare_socket_path(&config.socket_path)?;
    let listener = UnixListener::bind(&config.socket_path)
        .with_context(|| format!("unable to bind socket {}", config.socket_path.display()))?;

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;
    let (call_tx, mut call_rx) = mpsc::channel::<ClientCall>(CALL_QUEUE_CAPACITY);

    tracing::info!(
        target: "server",
        socket_path = %config.socket_path.display(),
        simulated_oracles = config.simulated_oracles.count,
        "server_listening"
    );
    eprintln!(
        "FlightSurety listening on unix socket (NDJSON): {}",
        config.socket_path.display()
    );

    let exit_reason = loop {
        tokio::select! {
            _ = sigint.recv() => break ExitReason::Signal("SIGINT"),
            _ = sigterm.recv() => break ExitReason::Signal("SIGTERM"),
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => {
                        let calls = call_tx.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_client(stream, calls).await {
                                tracing::warn!(target: "server", error = %format!("{err:#}"), "client_handling_failed");
                            }
                        });
                    }
                    Err(err) => tracing::warn!(target: "server", error = %err, "accept_failed"),
                }
            }
            Some(call) = call_rx.recv() => {
                let reply = host.handle(&call.request);
                let _ = call.reply.send(reply.response);
                if reply.stop {
                    break ExitReason::ShutdownCall;
                }
            }
            Some(report) = report_rx.recv() => host.submit_report(report),
        }
    };

    cancel.cancel();
    drop(report_rx);
    if let Some(task) = agents_task {
        let _ = task.await;
    }
    host.persist()
        .map_err(|err| anyhow!("failed to persist final state: {err}"))?;
    cleanup_socket_path(&config.socket_path)?;

    match exit_reason {
        ExitReason::ShutdownCall => {
            tracing::info!(target: "server", reason = "shutdown_call", "server_stopped")
        }
        ExitReason::Signal(signal_name) => {
            tracing::info!(target: "server", reason = signal_name, "server_stopped")
        }
    }
    Ok(())
}

fn status_source(config: &Config) -> Result<Arc<dyn StatusSourcePort>> {
    match config.simulated_oracles.fixed_status_code {
        Some(code) => {
            let status = FlightStatusCode::from_code(code)
                .ok_or_else(|| anyhow!("unknown simulated_oracles.fixed_status_code {code}"))?;
            Ok(Arc::new(FixedStatusSource(status)))
        }
        None => Ok(Arc::new(HashedStatusSource::new(config.consensus.seed.clone()))),
    }
}

async fn handle_client(stream: UnixStream, calls: mpsc::Sender<ClientCall>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match parse_request(line) {
            Ok(request) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                if calls
                    .send(ClientCall {
                        request,
                        reply: reply_tx,
                    })
                    .await
                    .is_err()
                {
                    bail!("engine loop has stopped");
                }
                reply_rx.await.context("engine loop dropped the reply")?
            }
            Err(err) => {
                tracing::debug!(target: "server", error = %err, "invalid_protocol_message");
                SuretyResponse::failure(err.request_id(), err.into())
            }
        };

        let mut encoded =
            serde_json::to_vec(&response).context("failed to encode response line")?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }

    Ok(())
}

fn prepare_socket_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("unable to create {}", parent.display()))?;
    }

    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_socket() || metadata.is_file() => {
            fs::remove_file(path)
                .with_context(|| format!("unable to remove stale socket {}", path.display()))
        }
        Ok(_) => bail!(
            "socket path exists but is not a file or socket: {}",
            path.display()
        ),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("unable to inspect {}", path.display())),
    }
}

fn cleanup_socket_path(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("unable to remove {}", path.display())),
    }
}
