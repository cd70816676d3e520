use agriflow::adapters::InMemoryStore;
use agriflow::agents::{Agent, RoutingAgent, SustainabilityAgent, WeatherAgent};
use agriflow::config::RoutingConfig;
use agriflow::domain::{keys, PipelineSeed, PipelineState, Route};
use agriflow::error::{AgriflowError, Result};
use agriflow::pipeline::{AgentStatus, Pipeline, RunPhase};
use agriflow::spatial::Coord;
use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Overwrites `field_risk`, then panics before returning
struct PanicsMidway;

#[async_trait]
impl Agent for PanicsMidway {
    fn id(&self) -> &str {
        "panics_midway"
    }

    fn name(&self) -> &str {
        "Panics Midway"
    }

    async fn process(&mut self, mut state: PipelineState) -> Result<PipelineState> {
        state.insert(keys::FIELD_RISK, json!("flood"));
        let empty: Vec<u8> = Vec::new();
        let byte = empty[3];
        state.insert("unreachable", json!(byte));
        Ok(state)
    }
}

/// Overwrites `field_risk_window`, then returns an error
struct ErrorsOut;

#[async_trait]
impl Agent for ErrorsOut {
    fn id(&self) -> &str {
        "errors_out"
    }

    fn name(&self) -> &str {
        "Errors Out"
    }

    async fn process(&mut self, mut state: PipelineState) -> Result<PipelineState> {
        state.insert(keys::FIELD_RISK_WINDOW, json!("never"));
        Err(AgriflowError::QueryFailed("connection refused".to_string()))
    }
}

fn seed() -> PipelineState {
    let mut farms = BTreeMap::new();
    farms.insert("F1".to_string(), Coord::new(-24.2, 26.1));
    farms.insert("F2".to_string(), Coord::new(-24.9, 26.4));
    let seed = PipelineSeed {
        country_iso: "BWA".to_string(),
        commodities: vec!["Maize".to_string()],
        horizon: 6,
        payload_tonnes: 10.0,
        start_coord: Coord::new(-24.65, 25.91),
        end_coord: Coord::new(-25.90, 28.20),
        farm_coords: farms,
        price_shift: 0.0,
        routes: Vec::new(),
    };
    seed.into_state()
        .unwrap()
        .with(keys::FIELD_RISK, "normal")
        .unwrap()
        .with(keys::FIELD_RISK_WINDOW, "2023-12-01 → 2023-12-31")
        .unwrap()
}

fn routing_config() -> RoutingConfig {
    RoutingConfig {
        search_time_limit_ms: 500,
        ..RoutingConfig::default()
    }
}

#[tokio::test]
async fn test_faulty_parallel_agents_leave_their_keys_untouched() {
    let store = Arc::new(InMemoryStore::new());
    let mut pipeline = Pipeline::builder()
        .parallel(PanicsMidway)
        .parallel(ErrorsOut)
        .parallel(WeatherAgent::new(store.clone()))
        .routing(RoutingAgent::new(store, routing_config()))
        .sustainability(SustainabilityAgent::new())
        .build();

    let (state, report) = pipeline.run_with_report(seed()).await;

    assert_eq!(state.get(keys::FIELD_RISK), Some(&json!("normal")));
    assert_eq!(
        state.get(keys::FIELD_RISK_WINDOW),
        Some(&json!("2023-12-01 → 2023-12-31"))
    );

    // The healthy sibling still contributed
    assert!(state.contains_key(keys::WEATHER_OUTLOOK));

    assert_eq!(
        report.outcome("panics_midway").map(|o| o.status),
        Some(AgentStatus::Panicked)
    );
    let failed = report.outcome("errors_out").unwrap();
    assert_eq!(failed.status, AgentStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("connection refused"));

    assert!(report.is_done());
    assert_eq!(report.phases.last(), Some(&RunPhase::Done));
    let routes: Vec<Route> = state.require(keys::ROUTES).unwrap();
    assert_eq!(routes.len(), 2);
    assert!(state.contains_key(keys::SUSTAINABILITY_METRICS));
}

#[tokio::test]
async fn test_failing_routing_stage_passes_state_through() {
    let store = Arc::new(InMemoryStore::new());
    let mut pipeline = Pipeline::builder()
        .routing(RoutingAgent::new(store, routing_config()))
        .sustainability(SustainabilityAgent::new())
        .build();

    // No farms: the routing agent cannot run
    let mut input = PipelineState::new();
    input.insert(keys::COUNTRY_ISO, json!("BWA"));
    input.insert(keys::START_COORD, json!([-24.65, 25.91]));
    input.insert(keys::END_COORD, json!([-25.90, 28.20]));

    let (state, report) = pipeline.run_with_report(input.clone()).await;

    assert!(!state.contains_key(keys::ROUTES));
    assert_eq!(
        report.outcome("routing").map(|o| o.status),
        Some(AgentStatus::Failed)
    );
    // Sustainability still ran, on no routes
    assert_eq!(state.get(keys::OVERALL_SUSTAINABILITY_SCORE), Some(&json!(0.0)));
    for key in input.keys() {
        assert_eq!(state.get(key), input.get(key));
    }
}
