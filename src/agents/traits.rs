//! Agent trait: one unit of pipeline work
//!
//! An agent receives its own copy of the pipeline state and returns the
//! enriched state. The orchestrator merges the returned keys; it never
//! shares one instance between concurrent calls, so agents may keep
//! private caches behind `&mut self`.

use async_trait::async_trait;

use crate::domain::PipelineState;
use crate::error::Result;

#[async_trait]
pub trait Agent: Send {
    /// Stable identifier used in logs and run reports
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Transform the state. An `Err` (or a panic) drops this agent's
    /// contribution for the run; the input passes through unchanged.
    async fn process(&mut self, state: PipelineState) -> Result<PipelineState>;
}
