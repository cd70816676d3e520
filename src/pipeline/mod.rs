//! Pipeline orchestration
//!
//! `Pipeline` drives the fixed stage sequence over a `PipelineState`,
//! isolating agent failures; `RunReport` records what happened.

pub mod orchestrator;
pub mod report;

pub use orchestrator::{Pipeline, PipelineBuilder};
pub use report::{AgentOutcome, AgentStatus, RunPhase, RunReport, Stage};
