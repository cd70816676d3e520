//! Run report: which agents ran, how they ended, and the phases visited

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Scheduling unit of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// A: independent analyses run concurrently on one snapshot
    Parallel,
    /// B: one forecast per commodity
    Forecast,
    /// C
    Routing,
    /// D
    Sustainability,
    /// E: terminal
    Learning,
}

/// Run state machine; phases only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Seed,
    ParallelRunning,
    ParallelMerged,
    ForecastRunning,
    ForecastMerged,
    RoutingRunning,
    RoutingMerged,
    SustainabilityRunning,
    SustainabilityMerged,
    LearningRunning,
    Done,
}

impl RunPhase {
    pub const SEQUENCE: [RunPhase; 11] = [
        RunPhase::Seed,
        RunPhase::ParallelRunning,
        RunPhase::ParallelMerged,
        RunPhase::ForecastRunning,
        RunPhase::ForecastMerged,
        RunPhase::RoutingRunning,
        RunPhase::RoutingMerged,
        RunPhase::SustainabilityRunning,
        RunPhase::SustainabilityMerged,
        RunPhase::LearningRunning,
        RunPhase::Done,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Completed,
    Failed,
    Panicked,
}

/// One agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub agent: String,
    pub stage: Stage,
    /// Commodity for forecast invocations
    pub subject: Option<String>,
    pub status: AgentStatus,
    pub error: Option<String>,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

impl AgentOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == AgentStatus::Completed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcomes: Vec<AgentOutcome>,
    pub phases: Vec<RunPhase>,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &AgentOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn outcome(&self, agent: &str) -> Option<&AgentOutcome> {
        self.outcomes.iter().find(|o| o.agent == agent)
    }

    pub fn is_done(&self) -> bool {
        self.phases.last() == Some(&RunPhase::Done)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
