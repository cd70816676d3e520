use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::Agent;
use crate::adapters::QueryService;
use crate::config::RoutingConfig;
use crate::domain::{keys, PipelineState, RiskAssessment};
use crate::error::Result;
use crate::routing::{RouteRequest, RoutingEngine};
use crate::spatial::Coord;

pub const DEFAULT_PAYLOAD_TONNES: f64 = 10.0;

/// Plans the truck routes from the merged farm, risk and fuel data
pub struct RoutingAgent {
    engine: RoutingEngine,
}

impl RoutingAgent {
    pub fn new(store: Arc<dyn QueryService>, config: RoutingConfig) -> Self {
        Self {
            engine: RoutingEngine::new(store, config),
        }
    }
}

#[async_trait]
impl Agent for RoutingAgent {
    fn id(&self) -> &str {
        "routing"
    }

    fn name(&self) -> &str {
        "Route Planner"
    }

    async fn process(&mut self, mut state: PipelineState) -> Result<PipelineState> {
        let iso: String = state.require(keys::COUNTRY_ISO)?;
        let start: Coord = state.require(keys::START_COORD)?;
        let end: Coord = state.require(keys::END_COORD)?;
        let farms: BTreeMap<String, Coord> = state.require(keys::FARM_COORDS)?;
        let payload_tonnes: f64 = state
            .get_as(keys::PAYLOAD_TONNES)?
            .unwrap_or(DEFAULT_PAYLOAD_TONNES);
        let risk: Vec<RiskAssessment> = state.get_as(keys::RISK_ASSESSMENTS)?.unwrap_or_default();

        let request = RouteRequest {
            country_iso: &iso,
            start,
            end,
            farms: &farms,
            payload_tonnes,
            risk: &risk,
        };
        let routes = self.engine.plan(&request).await;

        state.set(keys::ROUTES, &routes)?;
        state.set(keys::ROUTES_GENERATED_AT, &Utc::now())?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::Route;

    #[tokio::test]
    async fn test_missing_farms_fails_agent() {
        let state = PipelineState::new()
            .with(keys::COUNTRY_ISO, "BWA")
            .unwrap()
            .with(keys::START_COORD, &Coord::new(-24.65, 25.91))
            .unwrap()
            .with(keys::END_COORD, &Coord::new(-25.90, 28.20))
            .unwrap();
        let mut agent = RoutingAgent::new(Arc::new(InMemoryStore::new()), RoutingConfig::default());
        assert!(agent.process(state).await.is_err());
    }

    #[tokio::test]
    async fn test_routes_written() {
        let mut farms = BTreeMap::new();
        farms.insert("F01".to_string(), Coord::new(-24.2, 26.1));
        let state = PipelineState::new()
            .with(keys::COUNTRY_ISO, "BWA")
            .unwrap()
            .with(keys::START_COORD, &Coord::new(-24.65, 25.91))
            .unwrap()
            .with(keys::END_COORD, &Coord::new(-25.90, 28.20))
            .unwrap()
            .with(keys::FARM_COORDS, &farms)
            .unwrap();
        let mut agent = RoutingAgent::new(Arc::new(InMemoryStore::new()), RoutingConfig::default());

        let out = agent.process(state).await.unwrap();
        let routes: Vec<Route> = out.require(keys::ROUTES).unwrap();
        assert_eq!(routes.len(), 2);
        assert!(out.contains_key(keys::ROUTES_GENERATED_AT));
    }
}
