use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::report::{AgentOutcome, AgentStatus, RunPhase, RunReport, Stage};
use crate::adapters::QueryService;
use crate::agents::{
    Agent, ConflictRiskAgent, FieldRiskAgent, ForecastAgent, LearningAgent, RoutingAgent,
    SustainabilityAgent, WeatherAgent,
};
use crate::config::AppConfig;
use crate::domain::{keys, PipelineState};
use crate::ml::ModelService;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one agent on its own copy of the state.
///
/// Returns only the keys the agent added or changed; `None` when it failed
/// or panicked, in which case its contribution is dropped.
async fn invoke(
    agent: &mut dyn Agent,
    stage: Stage,
    subject: Option<&str>,
    input: PipelineState,
) -> (Option<PipelineState>, AgentOutcome) {
    let id = agent.id().to_string();
    let base = input.clone();
    let started = Instant::now();

    let result = AssertUnwindSafe(agent.process(input)).catch_unwind().await;

    let (changes, status, error) = match result {
        Ok(Ok(output)) => (Some(output.changes_from(&base)), AgentStatus::Completed, None),
        Ok(Err(e)) => {
            warn!(agent = %id, ?stage, error = %e, "agent failed, state passed through");
            (None, AgentStatus::Failed, Some(e.to_string()))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(agent = %id, ?stage, panic = %message, "agent panicked, state passed through");
            (None, AgentStatus::Panicked, Some(message))
        }
    };

    let outcome = AgentOutcome {
        agent: id,
        stage,
        subject: subject.map(str::to_string),
        status,
        error,
        elapsed: started.elapsed(),
    };
    (changes, outcome)
}

/// Fixed five-stage orchestrator.
///
/// Stage A agents run concurrently on the same snapshot; forecast, routing,
/// sustainability and learning then run one after another. A failing agent
/// never aborts the run.
pub struct Pipeline {
    parallel: Vec<Box<dyn Agent>>,
    forecast: Option<Box<dyn Agent>>,
    routing: Option<Box<dyn Agent>>,
    sustainability: Option<Box<dyn Agent>>,
    learning: Option<Box<dyn Agent>>,
    parallel_workers: usize,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Every agent wired to the given store and model service
    pub fn standard(
        store: Arc<dyn QueryService>,
        models: Arc<dyn ModelService>,
        config: &AppConfig,
    ) -> Self {
        Self::builder()
            .parallel(FieldRiskAgent::new(Arc::clone(&store)))
            .parallel(WeatherAgent::new(Arc::clone(&store)))
            .parallel(ConflictRiskAgent::new(Arc::clone(&store)))
            .forecast(ForecastAgent::standard(models, Arc::clone(&store), &config.forecast))
            .routing(RoutingAgent::new(store, config.routing.clone()))
            .sustainability(SustainabilityAgent::new())
            .learning(LearningAgent::new())
            .parallel_workers(config.pipeline.parallel_workers)
            .build()
    }

    /// Agent ids in stage order
    pub fn agent_ids(&self) -> Vec<String> {
        self.parallel
            .iter()
            .chain(self.forecast.iter())
            .chain(self.routing.iter())
            .chain(self.sustainability.iter())
            .chain(self.learning.iter())
            .map(|a| a.id().to_string())
            .collect()
    }

    /// Run every stage and return the accumulated state
    pub async fn run(&mut self, seed: PipelineState) -> PipelineState {
        self.run_with_report(seed).await.0
    }

    pub async fn run_with_report(&mut self, seed: PipelineState) -> (PipelineState, RunReport) {
        let mut report = RunReport {
            run_id: Uuid::new_v4(),
            ..RunReport::default()
        };
        let mut acc = seed;
        let started = Instant::now();

        enter(&mut report, RunPhase::Seed);

        enter(&mut report, RunPhase::ParallelRunning);
        self.run_parallel(&mut acc, &mut report).await;
        enter(&mut report, RunPhase::ParallelMerged);

        enter(&mut report, RunPhase::ForecastRunning);
        self.run_forecasts(&mut acc, &mut report).await;
        enter(&mut report, RunPhase::ForecastMerged);

        enter(&mut report, RunPhase::RoutingRunning);
        run_sequential(self.routing.as_mut(), Stage::Routing, &mut acc, &mut report).await;
        enter(&mut report, RunPhase::RoutingMerged);

        enter(&mut report, RunPhase::SustainabilityRunning);
        run_sequential(
            self.sustainability.as_mut(),
            Stage::Sustainability,
            &mut acc,
            &mut report,
        )
        .await;
        enter(&mut report, RunPhase::SustainabilityMerged);

        enter(&mut report, RunPhase::LearningRunning);
        run_sequential(self.learning.as_mut(), Stage::Learning, &mut acc, &mut report).await;
        enter(&mut report, RunPhase::Done);

        info!(
            run_id = %report.run_id,
            agents = report.outcomes.len(),
            failures = report.failures().count(),
            keys = acc.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline run complete"
        );
        (acc, report)
    }

    /// Stage A: fan out on copies of the same snapshot, merge as they finish
    async fn run_parallel(&mut self, acc: &mut PipelineState, report: &mut RunReport) {
        let agents = std::mem::take(&mut self.parallel);
        let permits = Arc::new(Semaphore::new(self.parallel_workers.max(1)));
        let mut tasks = JoinSet::new();

        for (idx, mut agent) in agents.into_iter().enumerate() {
            let snapshot = acc.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let (changes, outcome) = invoke(agent.as_mut(), Stage::Parallel, None, snapshot).await;
                (idx, agent, changes, outcome)
            });
        }

        let mut returned = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, agent, changes, outcome)) => {
                    if let Some(changes) = changes {
                        acc.merge(changes);
                    }
                    report.outcomes.push(outcome);
                    returned.push((idx, agent));
                }
                Err(e) => error!(error = %e, "parallel agent task aborted"),
            }
        }

        returned.sort_by_key(|(idx, _)| *idx);
        self.parallel = returned.into_iter().map(|(_, agent)| agent).collect();
    }

    /// Stage B: one forecast per commodity, collected under per-commodity maps
    async fn run_forecasts(&mut self, acc: &mut PipelineState, report: &mut RunReport) {
        let Some(agent) = self.forecast.as_mut() else {
            return;
        };
        let commodities: Vec<String> = match acc.get_as(keys::COMMODITIES) {
            Ok(list) => list.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "commodity list unreadable, skipping forecasts");
                Vec::new()
            }
        };

        let mut forecasts = Map::new();
        let mut methods = Map::new();
        let mut fallbacks = Map::new();
        for commodity in commodities {
            let mut input = acc.clone();
            input.insert(keys::COMMODITY, Value::String(commodity.clone()));

            let (changes, outcome) = invoke(agent.as_mut(), Stage::Forecast, Some(&commodity), input).await;
            report.outcomes.push(outcome);

            let Some(output) = changes else { continue };
            if let Some(points) = output.get(keys::FORECAST) {
                forecasts.insert(commodity.clone(), points.clone());
            }
            if let Some(trail) = output.get(keys::FORECAST_FALLBACKS) {
                fallbacks.insert(commodity.clone(), trail.clone());
            }
            if let Some(method) = output.get(keys::METHOD_USED) {
                methods.insert(commodity, method.clone());
            }
        }

        acc.insert(keys::COMMODITY_FORECASTS, Value::Object(forecasts));
        acc.insert(keys::COMMODITY_FORECAST_METHODS, Value::Object(methods));
        acc.insert(keys::COMMODITY_FORECAST_FALLBACKS, Value::Object(fallbacks));
    }
}

fn enter(report: &mut RunReport, phase: RunPhase) {
    info!(?phase, "pipeline phase");
    report.phases.push(phase);
}

async fn run_sequential(
    agent: Option<&mut Box<dyn Agent>>,
    stage: Stage,
    acc: &mut PipelineState,
    report: &mut RunReport,
) {
    let Some(agent) = agent else {
        return;
    };
    let (changes, outcome) = invoke(agent.as_mut(), stage, None, acc.clone()).await;
    if let Some(changes) = changes {
        acc.merge(changes);
    }
    report.outcomes.push(outcome);
}

/// Assembles a [`Pipeline`]; stages without an agent are skipped
pub struct PipelineBuilder {
    parallel: Vec<Box<dyn Agent>>,
    forecast: Option<Box<dyn Agent>>,
    routing: Option<Box<dyn Agent>>,
    sustainability: Option<Box<dyn Agent>>,
    learning: Option<Box<dyn Agent>>,
    parallel_workers: usize,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            parallel: Vec::new(),
            forecast: None,
            routing: None,
            sustainability: None,
            learning: None,
            parallel_workers: 3,
        }
    }
}

impl PipelineBuilder {
    pub fn parallel(mut self, agent: impl Agent + 'static) -> Self {
        self.parallel.push(Box::new(agent));
        self
    }

    pub fn forecast(mut self, agent: impl Agent + 'static) -> Self {
        self.forecast = Some(Box::new(agent));
        self
    }

    pub fn routing(mut self, agent: impl Agent + 'static) -> Self {
        self.routing = Some(Box::new(agent));
        self
    }

    pub fn sustainability(mut self, agent: impl Agent + 'static) -> Self {
        self.sustainability = Some(Box::new(agent));
        self
    }

    pub fn learning(mut self, agent: impl Agent + 'static) -> Self {
        self.learning = Some(Box::new(agent));
        self
    }

    pub fn parallel_workers(mut self, workers: usize) -> Self {
        self.parallel_workers = workers;
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            parallel: self.parallel,
            forecast: self.forecast,
            routing: self.routing,
            sustainability: self.sustainability,
            learning: self.learning,
            parallel_workers: self.parallel_workers,
        }
    }
}
