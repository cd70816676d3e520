use agriflow::adapters::InMemoryStore;
use agriflow::agents::{Grade, RouteSustainability};
use agriflow::config::AppConfig;
use agriflow::domain::{keys, ForecastTier, PipelineSeed, Route, TierFallback};
use agriflow::ml::TrendModelService;
use agriflow::pipeline::{AgentStatus, Pipeline, RunPhase};
use agriflow::spatial::Coord;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

fn two_farm_seed() -> PipelineSeed {
    let mut farms = BTreeMap::new();
    farms.insert("F1".to_string(), Coord::new(-24.2, 26.1));
    farms.insert("F2".to_string(), Coord::new(-24.9, 26.4));
    PipelineSeed {
        country_iso: "BWA".to_string(),
        commodities: vec!["Maize".to_string(), "Sorghum".to_string()],
        horizon: 6,
        payload_tonnes: 10.0,
        start_coord: Coord::new(-24.65, 25.91),
        end_coord: Coord::new(-25.90, 28.20),
        farm_coords: farms,
        price_shift: 0.0,
        routes: Vec::new(),
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.routing.fleet_size = 2;
    config.routing.search_time_limit_ms = 500;
    config
}

#[tokio::test]
async fn test_two_farm_scenario_against_empty_store() {
    let store = Arc::new(InMemoryStore::new());
    let models = Arc::new(TrendModelService::new(store.clone()));
    let mut pipeline = Pipeline::standard(store, models, &config());

    let seed = two_farm_seed().into_state().unwrap();
    let (state, report) = pipeline.run_with_report(seed.clone()).await;

    // Output is a superset of the seed
    for key in seed.keys() {
        assert!(state.contains_key(key), "seed key {key} lost");
    }

    let routes: Vec<Route> = state.require(keys::ROUTES).unwrap();
    assert_eq!(routes.len(), 2);
    for route in &routes {
        assert!(route.final_leg_km >= 0.0);
        assert!(route.total_km >= route.final_leg_km);
        assert!(route.eta_hours >= 0.0);
        // No seed routes, so conflict assessment had nothing to match
        assert!(!route.risk_evaluated);
        assert!(route.conflicts.is_empty());
    }
    let mut visited: Vec<String> = routes.iter().flat_map(|r| r.stops.clone()).collect();
    visited.sort();
    assert_eq!(visited, vec!["F1", "F2"]);

    assert!(report.is_done());
    assert_eq!(report.phases, RunPhase::SEQUENCE.to_vec());
    assert_eq!(
        report.failures().count(),
        0,
        "unexpected failures: {:?}",
        report.failures().collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_forecasts_degrade_to_reference_prices() {
    let store = Arc::new(InMemoryStore::new());
    let models = Arc::new(TrendModelService::new(store.clone()));
    let mut pipeline = Pipeline::standard(store, models, &config());

    let state = pipeline.run(two_farm_seed().into_state().unwrap()).await;

    let methods = state.get(keys::COMMODITY_FORECAST_METHODS).unwrap();
    assert_eq!(methods["Maize"], Value::from("spot_price"));
    assert_eq!(methods["Sorghum"], Value::from("spot_price"));

    let forecasts = state.get(keys::COMMODITY_FORECASTS).unwrap();
    let maize = forecasts["Maize"].as_array().unwrap();
    assert_eq!(maize.len(), 6);
    assert_eq!(maize[0]["price"], Value::from(0.425));

    let trails: BTreeMap<String, Vec<TierFallback>> =
        state.require(keys::COMMODITY_FORECAST_FALLBACKS).unwrap();
    let skipped: Vec<ForecastTier> = trails["Maize"].iter().map(|f| f.tier).collect();
    assert_eq!(
        skipped,
        vec![ForecastTier::TrainedModel, ForecastTier::RollingMean]
    );
    assert!(trails["Maize"].iter().all(|f| !f.reason.is_empty()));
    assert_eq!(trails["Sorghum"].len(), 2);
}

#[tokio::test]
async fn test_history_in_store_selects_model_tier() {
    let store = Arc::new(InMemoryStore::new().with_commodity_prices(
        "Maize",
        &[(2019, 180.0), (2020, 190.0), (2021, 200.0), (2022, 210.0)],
    ));
    let models = Arc::new(TrendModelService::new(store.clone()));
    let mut pipeline = Pipeline::standard(store, models, &config());

    let mut seed = two_farm_seed();
    seed.commodities = vec!["Maize".to_string()];
    let state = pipeline.run(seed.into_state().unwrap()).await;

    let methods = state.get(keys::COMMODITY_FORECAST_METHODS).unwrap();
    assert_eq!(methods["Maize"], Value::from("trained_model"));
    let forecasts = state.get(keys::COMMODITY_FORECASTS).unwrap();
    assert_eq!(forecasts["Maize"][0]["year"], Value::from(2023));
    assert_eq!(forecasts["Maize"][0]["price"], Value::from(220.0));
}

#[tokio::test]
async fn test_downstream_stages_score_the_routes() {
    let store = Arc::new(InMemoryStore::new());
    let models = Arc::new(TrendModelService::new(store.clone()));
    let mut pipeline = Pipeline::standard(store, models, &config());

    let (state, report) = pipeline.run_with_report(two_farm_seed().into_state().unwrap()).await;

    let metrics: Vec<RouteSustainability> = state.require(keys::SUSTAINABILITY_METRICS).unwrap();
    assert_eq!(metrics.len(), 2);
    assert!(metrics.iter().all(|m| m.carbon_footprint_kg_co2 > 0.0));
    assert!(metrics.iter().all(|m| m.sustainability_grade != Grade::F));
    let overall: f64 = state.require(keys::OVERALL_SUSTAINABILITY_SCORE).unwrap();
    assert!(overall > 0.0 && overall <= 1.0);

    let confidence: f64 = state.require(keys::MODEL_CONFIDENCE).unwrap();
    assert_eq!(confidence, 0.5);
    assert_eq!(
        report.outcome("learning").map(|o| o.status),
        Some(AgentStatus::Completed)
    );
}

#[tokio::test]
async fn test_unreachable_store_still_returns_routes() {
    let store = Arc::new(InMemoryStore::unreachable());
    let models = Arc::new(TrendModelService::new(store.clone()));
    let mut pipeline = Pipeline::standard(store, models, &config());

    let (state, report) = pipeline.run_with_report(two_farm_seed().into_state().unwrap()).await;

    assert!(report.is_done());
    let routes: Vec<Route> = state.require(keys::ROUTES).unwrap();
    assert_eq!(routes.len(), 2);
    // Stub tier is the only one that cannot fail
    let methods = state.get(keys::COMMODITY_FORECAST_METHODS).unwrap();
    assert!(matches!(methods["Maize"].as_str(), Some("spot_price") | Some("stub")));
}
