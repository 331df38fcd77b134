use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tokio_util::sync::CancellationToken;

use crate::{
    error::SuretyError,
    events::SuretyEvent,
    oracle::types::OracleIndexes,
    surety::FlightSurety,
    types::{FlightKey, FlightStatusCode, Identity, Micro},
};

/// Where a simulated oracle learns what happened to a flight.
#[async_trait]
pub trait StatusSourcePort: Send + Sync {
    async fn observe(&self, oracle: &str, flight: &FlightKey) -> FlightStatusCode;
}

#[derive(Debug, Clone, Copy)]
pub struct FixedStatusSource(pub FlightStatusCode);

#[async_trait]
impl StatusSourcePort for FixedStatusSource {
    async fn observe(&self, _oracle: &str, _flight: &FlightKey) -> FlightStatusCode {
        self.0
    }
}

/// Derives a status from the flight alone, so every agent asked about the
/// same flight agrees.
#[derive(Debug, Clone)]
pub struct HashedStatusSource {
    seed: String,
}

impl HashedStatusSource {
    pub fn new(seed: impl Into<String>) -> Self {
        Self { seed: seed.into() }
    }

    pub fn status_for(&self, flight: &FlightKey) -> FlightStatusCode {
        let digest = Sha256::new()
            .chain_update(self.seed.as_bytes())
            .chain_update([0u8])
            .chain_update(flight.to_string().as_bytes())
            .finalize();
        let slot = usize::from(digest[0]) % FlightStatusCode::ALL.len();
        FlightStatusCode::ALL[slot]
    }
}

#[async_trait]
impl StatusSourcePort for HashedStatusSource {
    async fn observe(&self, _oracle: &str, flight: &FlightKey) -> FlightStatusCode {
        self.status_for(flight)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleAgent {
    pub id: Identity,
    pub indexes: OracleIndexes,
}

/// A response an agent wants submitted on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReport {
    pub oracle: Identity,
    pub index: u8,
    pub flight: FlightKey,
    pub status_code: FlightStatusCode,
}

pub struct OracleAgentPool {
    agents: Vec<OracleAgent>,
    source: Arc<dyn StatusSourcePort>,
}

impl OracleAgentPool {
    pub fn new(agents: Vec<OracleAgent>, source: Arc<dyn StatusSourcePort>) -> Self {
        Self { agents, source }
    }

    /// Makes sure `count` agents named `{prefix}{n}` are registered oracles.
    /// Agents already known from an earlier run keep their indexes; new ones
    /// get their fee deposited and pay it in.
    pub fn enroll(
        engine: &mut FlightSurety,
        prefix: &str,
        count: usize,
        fee_micro: Micro,
    ) -> Result<Vec<OracleAgent>, SuretyError> {
        let mut agents = Vec::with_capacity(count);
        for n in 1..=count {
            let id = format!("{prefix}{n}");
            let indexes = match engine.oracles().oracle(&id) {
                Some(oracle) => oracle.indexes,
                None => {
                    engine.deposit(&id, fee_micro)?;
                    engine.register_oracle(&id, fee_micro)?
                }
            };
            agents.push(OracleAgent { id, indexes });
        }
        Ok(agents)
    }

    pub fn agents(&self) -> &[OracleAgent] {
        &self.agents
    }

    pub fn responders(&self, index: u8) -> impl Iterator<Item = &OracleAgent> {
        self.agents
            .iter()
            .filter(move |agent| agent.indexes.contains(&index))
    }

    pub fn spawn(
        self,
        events: broadcast::Receiver<SuretyEvent>,
        reports: mpsc::Sender<AgentReport>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(events, reports, cancel))
    }

    pub async fn run(
        self,
        events: broadcast::Receiver<SuretyEvent>,
        reports: mpsc::Sender<AgentReport>,
        cancel: CancellationToken,
    ) {
        tracing::info!(target: "oracle_agents", agents = self.agents.len(), "oracle_agents_started");
        let mut events = BroadcastStream::new(events);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = events.next() => next,
            };
            let event = match next {
                None => break,
                Some(Ok(event)) => event,
                Some(Err(lagged)) => {
                    tracing::warn!(target: "oracle_agents", error = %lagged, "oracle_agents_lagged");
                    continue;
                }
            };
            let SuretyEvent::StatusRequested { index, flight, .. } = event else {
                continue;
            };

            for agent in self.responders(index) {
                let status_code = self.source.observe(&agent.id, &flight).await;
                let report = AgentReport {
                    oracle: agent.id.clone(),
                    index,
                    flight: flight.clone(),
                    status_code,
                };
                let sent = tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = reports.send(report) => sent,
                };
                if sent.is_err() {
                    tracing::debug!(target: "oracle_agents", "report_channel_closed");
                    return;
                }
            }
        }
        tracing::info!(target: "oracle_agents", "oracle_agents_stopped");
    }
}
