use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{ForecastRequest, ForecastStrategy, ModelTier, RollingMeanTier, SpotPriceTier, StubTier};
use crate::adapters::QueryService;
use crate::config::ForecastConfig;
use crate::domain::{ForecastPoint, ForecastTier, TaggedForecast, TierFallback};
use crate::error::{AgriflowError, Result};
use crate::ml::ModelService;

/// Ordered forecast strategies; first complete series wins
pub struct ForecastCascade {
    tiers: Vec<Box<dyn ForecastStrategy>>,
}

impl ForecastCascade {
    pub fn new(tiers: Vec<Box<dyn ForecastStrategy>>) -> Self {
        Self { tiers }
    }

    /// Model → rolling mean → spot → stub
    pub fn standard(
        models: Arc<dyn ModelService>,
        store: Arc<dyn QueryService>,
        config: &ForecastConfig,
    ) -> Self {
        Self::new(vec![
            Box::new(ModelTier::new(models)),
            Box::new(RollingMeanTier::new(store, config)),
            Box::new(SpotPriceTier),
            Box::new(StubTier::from(config)),
        ])
    }

    pub fn tiers(&self) -> Vec<ForecastTier> {
        self.tiers.iter().map(|t| t.tier()).collect()
    }

    /// Forecast exactly `horizon` points (at least one) for a commodity.
    ///
    /// `shift_pct` (5.0 = +5%) is applied to whichever tier answered.
    /// Fails only if every tier came back empty, which the standard cascade
    /// rules out with its stub tier.
    pub async fn forecast(
        &mut self,
        commodity: &str,
        country_iso: &str,
        horizon: usize,
        shift_pct: f64,
    ) -> Result<TaggedForecast> {
        let request = ForecastRequest {
            commodity,
            country_iso,
            horizon: horizon.max(1),
        };
        let mut fallbacks = Vec::new();

        for strategy in self.tiers.iter_mut() {
            let tier = strategy.tier();
            let reason = match strategy.attempt(&request).await {
                Ok(points) if points.len() >= request.horizon => {
                    let points = apply_shift(points, request.horizon, shift_pct);
                    info!(
                        "Forecast for {} from {} ({} points, {} fallbacks)",
                        commodity,
                        tier,
                        points.len(),
                        fallbacks.len()
                    );
                    return Ok(TaggedForecast {
                        commodity: commodity.to_string(),
                        tier,
                        points,
                        fallbacks,
                    });
                }
                Ok(points) if points.is_empty() => "no data".to_string(),
                Ok(points) => format!(
                    "incomplete series: {} of {} points",
                    points.len(),
                    request.horizon
                ),
                Err(e) if e.is_data_unavailable() => {
                    debug!("{} tier unavailable for {}: {}", tier, commodity, e);
                    e.to_string()
                }
                Err(e) => e.to_string(),
            };
            warn!("Forecast tier {} skipped for {}: {}", tier, commodity, reason);
            fallbacks.push(TierFallback { tier, reason });
        }

        Err(AgriflowError::Internal(format!(
            "every forecast tier failed for {commodity}"
        )))
    }
}

fn apply_shift(mut points: Vec<ForecastPoint>, horizon: usize, shift_pct: f64) -> Vec<ForecastPoint> {
    points.truncate(horizon);
    if shift_pct != 0.0 {
        let factor = 1.0 + shift_pct / 100.0;
        for p in points.iter_mut() {
            p.price = (p.price * factor * 100.0).round() / 100.0;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStore, MockQueryService};
    use crate::ml::MockModelService;
    use async_trait::async_trait;

    struct Fixed(ForecastTier, Vec<ForecastPoint>);

    #[async_trait]
    impl ForecastStrategy for Fixed {
        fn tier(&self) -> ForecastTier {
            self.0
        }

        async fn attempt(&mut self, _: &ForecastRequest<'_>) -> Result<Vec<ForecastPoint>> {
            Ok(self.1.clone())
        }
    }

    fn flat(n: i32, price: f64) -> Vec<ForecastPoint> {
        (1..=n).map(|i| ForecastPoint::new(2024 + i, price)).collect()
    }

    fn failing_models() -> MockModelService {
        let mut models = MockModelService::new();
        models
            .expect_train()
            .returning(|_| Err(AgriflowError::ModelUnavailable("no model".into())));
        models
    }

    fn unreachable_store() -> MockQueryService {
        let mut store = MockQueryService::new();
        store
            .expect_commodity_prices()
            .returning(|_| Err(AgriflowError::QueryFailed("unreachable".into())));
        store
    }

    #[tokio::test]
    async fn test_every_horizon_is_exact_even_when_tiers_fail() {
        for horizon in [1, 6, 12] {
            let mut cascade = ForecastCascade::standard(
                Arc::new(failing_models()),
                Arc::new(unreachable_store()),
                &ForecastConfig::default(),
            );
            for (commodity, iso) in [("Maize", "BWA"), ("Maize", "ZWE"), ("Quinoa", "XXX")] {
                let f = cascade.forecast(commodity, iso, horizon, 0.0).await.unwrap();
                assert_eq!(f.points.len(), horizon, "{commodity}/{iso}/{horizon}");
            }
        }
    }

    #[tokio::test]
    async fn test_spot_then_stub_tagging() {
        let mut cascade = ForecastCascade::standard(
            Arc::new(failing_models()),
            Arc::new(InMemoryStore::new()),
            &ForecastConfig::default(),
        );

        let spot = cascade.forecast("Maize", "BWA", 6, 0.0).await.unwrap();
        assert_eq!(spot.tier, ForecastTier::SpotPrice);
        assert_eq!(
            spot.fallbacks.iter().map(|f| f.tier).collect::<Vec<_>>(),
            vec![ForecastTier::TrainedModel, ForecastTier::RollingMean]
        );

        let stub = cascade.forecast("Maize", "ZWE", 6, 0.0).await.unwrap();
        assert_eq!(stub.tier, ForecastTier::Stub);
        assert_eq!(stub.fallbacks.len(), 3);
    }

    #[tokio::test]
    async fn test_short_series_rejected_long_series_truncated() {
        let mut cascade = ForecastCascade::new(vec![
            Box::new(Fixed(ForecastTier::TrainedModel, flat(3, 10.0))),
            Box::new(Fixed(ForecastTier::RollingMean, flat(20, 20.0))),
        ]);
        let f = cascade.forecast("Maize", "BWA", 6, 0.0).await.unwrap();
        assert_eq!(f.tier, ForecastTier::RollingMean);
        assert_eq!(f.points.len(), 6);
        assert!(f.fallbacks[0].reason.contains("incomplete"));
    }

    #[tokio::test]
    async fn test_shift_applies_to_winning_tier() {
        let mut cascade = ForecastCascade::new(vec![
            Box::new(Fixed(ForecastTier::TrainedModel, Vec::new())),
            Box::new(Fixed(ForecastTier::SpotPrice, flat(4, 200.0))),
        ]);
        let f = cascade.forecast("Maize", "BWA", 4, 5.0).await.unwrap();
        assert_eq!(f.tier, ForecastTier::SpotPrice);
        assert!(f.points.iter().all(|p| p.price == 210.0));
        assert_eq!(f.fallbacks[0].reason, "no data");
    }

    #[tokio::test]
    async fn test_all_tiers_empty_is_error() {
        let mut cascade = ForecastCascade::new(vec![Box::new(Fixed(ForecastTier::Stub, Vec::new()))]);
        assert!(cascade.forecast("Maize", "BWA", 4, 0.0).await.is_err());
    }

    #[test]
    fn test_standard_order() {
        let cascade = ForecastCascade::standard(
            Arc::new(MockModelService::new()),
            Arc::new(InMemoryStore::new()),
            &ForecastConfig::default(),
        );
        assert_eq!(
            cascade.tiers(),
            vec![
                ForecastTier::TrainedModel,
                ForecastTier::RollingMean,
                ForecastTier::SpotPrice,
                ForecastTier::Stub
            ]
        );
    }
}
