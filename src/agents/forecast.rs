use async_trait::async_trait;
use std::sync::Arc;

use super::Agent;
use crate::adapters::QueryService;
use crate::config::ForecastConfig;
use crate::domain::{keys, PipelineState};
use crate::error::{AgriflowError, Result};
use crate::forecast::ForecastCascade;
use crate::ml::ModelService;

/// Runs the forecast cascade for the commodity named in the state.
///
/// The cascade (and the trained-model readiness it caches) lives as long as
/// the agent, so a commodity whose model failed to train is not retried.
pub struct ForecastAgent {
    cascade: ForecastCascade,
    default_horizon: usize,
}

impl ForecastAgent {
    pub fn new(cascade: ForecastCascade, default_horizon: usize) -> Self {
        Self {
            cascade,
            default_horizon,
        }
    }

    pub fn standard(models: Arc<dyn ModelService>, store: Arc<dyn QueryService>, config: &ForecastConfig) -> Self {
        Self::new(ForecastCascade::standard(models, store, config), config.default_horizon)
    }
}

#[async_trait]
impl Agent for ForecastAgent {
    fn id(&self) -> &str {
        "forecast"
    }

    fn name(&self) -> &str {
        "Price Forecast"
    }

    async fn process(&mut self, mut state: PipelineState) -> Result<PipelineState> {
        let commodity: String = match state.get_as(keys::COMMODITY)? {
            Some(c) => c,
            None => state
                .get_as::<Vec<String>>(keys::COMMODITIES)?
                .and_then(|list| list.into_iter().next())
                .ok_or_else(|| AgriflowError::InvalidState("no commodity to forecast".to_string()))?,
        };
        let iso: String = state.require(keys::COUNTRY_ISO)?;
        let horizon: usize = state.get_as(keys::HORIZON)?.unwrap_or(self.default_horizon);
        let shift: f64 = state.get_as(keys::PRICE_SHIFT)?.unwrap_or(0.0);

        let tagged = self.cascade.forecast(&commodity, &iso, horizon, shift).await?;

        state.set(keys::COMMODITY, &commodity)?;
        state.set(keys::FORECAST, &tagged.points)?;
        state.set(keys::METHOD_USED, tagged.tier.as_str())?;
        state.set(keys::FORECAST_FALLBACKS, &tagged.fallbacks)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::{ForecastPoint, ForecastTier};
    use crate::ml::MockModelService;

    fn agent() -> ForecastAgent {
        let mut models = MockModelService::new();
        models
            .expect_train()
            .times(1)
            .returning(|_| Err(AgriflowError::ModelUnavailable("no history".into())));
        ForecastAgent::standard(Arc::new(models), Arc::new(InMemoryStore::new()), &ForecastConfig::default())
    }

    #[tokio::test]
    async fn test_forecast_written_with_method() {
        let state = PipelineState::new()
            .with(keys::COUNTRY_ISO, "BWA")
            .unwrap()
            .with(keys::COMMODITY, "Maize")
            .unwrap()
            .with(keys::HORIZON, &6usize)
            .unwrap()
            .with(keys::PRICE_SHIFT, &10.0)
            .unwrap();

        let mut agent = agent();
        let out = agent.process(state.clone()).await.unwrap();
        let points: Vec<ForecastPoint> = out.require(keys::FORECAST).unwrap();
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| (p.price - 0.47).abs() < 1e-9));
        assert_eq!(
            out.require::<ForecastTier>(keys::METHOD_USED).unwrap(),
            ForecastTier::SpotPrice
        );

        // second call must not retrain
        agent.process(state).await.unwrap();
    }

    #[tokio::test]
    async fn test_defaults_to_first_commodity_and_horizon() {
        let state = PipelineState::new()
            .with(keys::COUNTRY_ISO, "ZWE")
            .unwrap()
            .with(keys::COMMODITIES, &["Maize"])
            .unwrap();
        let out = agent().process(state).await.unwrap();
        let points: Vec<ForecastPoint> = out.require(keys::FORECAST).unwrap();
        assert_eq!(points.len(), 12);
        assert_eq!(out.require::<String>(keys::COMMODITY).unwrap(), "Maize");
    }

    #[tokio::test]
    async fn test_missing_commodity_is_error() {
        let state = PipelineState::new().with(keys::COUNTRY_ISO, "BWA").unwrap();
        let mut models = MockModelService::new();
        models.expect_train().never();
        let mut agent =
            ForecastAgent::standard(Arc::new(models), Arc::new(InMemoryStore::new()), &ForecastConfig::default());
        assert!(agent.process(state).await.is_err());
    }
}
