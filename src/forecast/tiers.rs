use async_trait::async_trait;
use chrono::{Datelike, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ForecastRequest, ForecastStrategy};
use crate::adapters::{PriceObservation, QueryService};
use crate::config::ForecastConfig;
use crate::domain::{ForecastPoint, ForecastTier, ModelReadiness};
use crate::error::{AgriflowError, Result};
use crate::ml::ModelService;
use crate::reference;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn next_years(horizon: usize) -> impl Iterator<Item = i32> {
    let y0 = Utc::now().year();
    (1..=horizon as i32).map(move |i| y0 + i)
}

/// Trailing moving average of the last `window` observations (ordered by year)
pub fn moving_average(series: &[PriceObservation], window: usize) -> Option<f64> {
    if series.is_empty() || window == 0 {
        return None;
    }
    let tail = &series[series.len().saturating_sub(window)..];
    Some(tail.iter().map(|o| o.price).sum::<f64>() / tail.len() as f64)
}

// ---------------------------------------------------------------------------
// Tier 1
// ---------------------------------------------------------------------------

/// Trained-model tier. Training is attempted once per commodity; a failure
/// is remembered for the lifetime of the tier and never retried.
pub struct ModelTier {
    service: Arc<dyn ModelService>,
    readiness: HashMap<String, ModelReadiness>,
}

impl ModelTier {
    pub fn new(service: Arc<dyn ModelService>) -> Self {
        Self {
            service,
            readiness: HashMap::new(),
        }
    }

    pub fn readiness(&self, commodity: &str) -> ModelReadiness {
        self.readiness.get(commodity).copied().unwrap_or_default()
    }
}

#[async_trait]
impl ForecastStrategy for ModelTier {
    fn tier(&self) -> ForecastTier {
        ForecastTier::TrainedModel
    }

    async fn attempt(&mut self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastPoint>> {
        let commodity = request.commodity;

        if self.readiness(commodity) == ModelReadiness::Untried {
            let state = match self.service.train(commodity).await {
                Ok(()) => ModelReadiness::Ready,
                Err(e) => {
                    warn!("Model training for {} failed, disabling tier: {}", commodity, e);
                    ModelReadiness::Failed
                }
            };
            self.readiness.insert(commodity.to_string(), state);
        }

        if self.readiness(commodity) == ModelReadiness::Failed {
            return Err(AgriflowError::ModelUnavailable(format!(
                "no trained model for {commodity}"
            )));
        }

        match self.service.forecast(commodity, request.horizon).await {
            Ok(points) => Ok(points),
            Err(e) => {
                self.readiness
                    .insert(commodity.to_string(), ModelReadiness::Failed);
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tier 2
// ---------------------------------------------------------------------------

/// Rolling-mean tier: `price_i = round(B * (1 + s*i), 2)` where `B` is the
/// trailing commodity average and `s` the trailing fuel average scaled by
/// `trend_divisor`.
pub struct RollingMeanTier {
    store: Arc<dyn QueryService>,
    window: usize,
    fuel_type: String,
    trend_divisor: f64,
}

impl RollingMeanTier {
    pub fn new(store: Arc<dyn QueryService>, config: &ForecastConfig) -> Self {
        Self {
            store,
            window: config.rolling_window,
            fuel_type: config.fuel_type.clone(),
            trend_divisor: config.trend_divisor,
        }
    }

    /// Projection for offsets `1..=horizon` after `last_year`
    pub fn project(base: f64, rate: f64, last_year: i32, horizon: usize) -> Vec<ForecastPoint> {
        (1..=horizon as i32)
            .map(|i| ForecastPoint::new(last_year + i, round2(base * (1.0 + rate * f64::from(i)))))
            .collect()
    }
}

#[async_trait]
impl ForecastStrategy for RollingMeanTier {
    fn tier(&self) -> ForecastTier {
        ForecastTier::RollingMean
    }

    async fn attempt(&mut self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastPoint>> {
        let prices = self.store.commodity_prices(request.commodity).await?;
        let fuel = self.store.fuel_prices(&self.fuel_type).await?;

        let (Some(base), Some(fuel_avg), Some(last)) = (
            moving_average(&prices, self.window),
            moving_average(&fuel, self.window),
            prices.last(),
        ) else {
            return Ok(Vec::new());
        };

        let rate = fuel_avg / self.trend_divisor;
        info!(
            "Rolling mean for {}: base={:.2} rate={:.4} from {}",
            request.commodity, base, rate, last.year
        );
        Ok(Self::project(base, rate, last.year, request.horizon))
    }
}

// ---------------------------------------------------------------------------
// Tier 3
// ---------------------------------------------------------------------------

/// Flat projection of the reference spot price
#[derive(Debug, Default)]
pub struct SpotPriceTier;

#[async_trait]
impl ForecastStrategy for SpotPriceTier {
    fn tier(&self) -> ForecastTier {
        ForecastTier::SpotPrice
    }

    async fn attempt(&mut self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastPoint>> {
        let Some(spot) = reference::spot_price(request.country_iso, request.commodity) else {
            return Ok(Vec::new());
        };
        Ok(next_years(request.horizon)
            .map(|year| ForecastPoint::new(year, spot))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tier 4
// ---------------------------------------------------------------------------

/// Base price plus bounded uniform jitter. Never empty.
#[derive(Debug)]
pub struct StubTier {
    base: f64,
    jitter: f64,
}

impl StubTier {
    pub fn new(base: f64, jitter: f64) -> Self {
        Self {
            base,
            jitter: jitter.abs(),
        }
    }

    pub fn generate(&self, horizon: usize) -> Vec<ForecastPoint> {
        let mut rng = rand::thread_rng();
        next_years(horizon)
            .map(|year| {
                let noise = if self.jitter > 0.0 {
                    rng.gen_range(-self.jitter..=self.jitter)
                } else {
                    0.0
                };
                ForecastPoint::new(year, round2(self.base + noise))
            })
            .collect()
    }
}

impl From<&ForecastConfig> for StubTier {
    fn from(config: &ForecastConfig) -> Self {
        Self::new(config.stub_base_price, config.stub_jitter)
    }
}

#[async_trait]
impl ForecastStrategy for StubTier {
    fn tier(&self) -> ForecastTier {
        ForecastTier::Stub
    }

    async fn attempt(&mut self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastPoint>> {
        Ok(self.generate(request.horizon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryStore, MockQueryService};
    use crate::ml::MockModelService;

    fn request(horizon: usize) -> ForecastRequest<'static> {
        ForecastRequest {
            commodity: "Maize",
            country_iso: "BWA",
            horizon,
        }
    }

    fn obs(points: &[(i32, f64)]) -> Vec<PriceObservation> {
        points
            .iter()
            .map(|&(year, price)| PriceObservation { year, price })
            .collect()
    }

    #[test]
    fn test_moving_average_uses_trailing_window() {
        let series = obs(&[(2018, 1.0), (2019, 2.0), (2020, 3.0), (2021, 4.0)]);
        assert_eq!(moving_average(&series, 2), Some(3.5));
        assert_eq!(moving_average(&series, 10), Some(2.5));
        assert_eq!(moving_average(&[], 5), None);
    }

    #[test]
    fn test_rolling_projection_formula() {
        let base = 200.0;
        let rate = 1.2 / 1000.0;
        let points = RollingMeanTier::project(base, rate, 2023, 12);
        assert_eq!(points.len(), 12);
        for (idx, p) in points.iter().enumerate() {
            let i = (idx + 1) as f64;
            assert_eq!(p.year, 2023 + idx as i32 + 1);
            assert_eq!(p.price, ((base * (1.0 + rate * i)) * 100.0).round() / 100.0);
        }
    }

    #[tokio::test]
    async fn test_rolling_tier_from_store() {
        let store = InMemoryStore::new()
            .with_commodity_prices(
                "Maize",
                &[(2019, 100.0), (2020, 110.0), (2021, 120.0), (2022, 130.0), (2023, 140.0), (2024, 150.0)],
            )
            .with_fuel_prices("Diesel", &[(2023, 1.0), (2024, 1.0)]);
        let mut tier = RollingMeanTier::new(Arc::new(store), &ForecastConfig::default());

        let points = tier.attempt(&request(2)).await.unwrap();
        // base = mean(110..=150) = 130, rate = 0.001
        assert_eq!(points, vec![ForecastPoint::new(2025, 130.13), ForecastPoint::new(2026, 130.26)]);
    }

    #[tokio::test]
    async fn test_rolling_tier_without_fuel_history_is_empty() {
        let store = InMemoryStore::new()
            .with_commodity_prices("Maize", &[(2023, 140.0)])
            .with_fuel_prices("Petrol", &[(2023, 1.0)]);
        let mut tier = RollingMeanTier::new(Arc::new(store), &ForecastConfig::default());
        assert!(tier.attempt(&request(3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rolling_tier_propagates_query_failure() {
        let mut store = MockQueryService::new();
        store
            .expect_commodity_prices()
            .returning(|_| Err(AgriflowError::QueryFailed("connection refused".into())));
        let mut tier = RollingMeanTier::new(Arc::new(store), &ForecastConfig::default());
        assert!(tier.attempt(&request(3)).await.is_err());
    }

    #[tokio::test]
    async fn test_model_tier_failed_training_is_not_retried() {
        let mut service = MockModelService::new();
        service
            .expect_train()
            .times(1)
            .returning(|_| Err(AgriflowError::ModelUnavailable("no history".into())));
        service.expect_forecast().never();

        let mut tier = ModelTier::new(Arc::new(service));
        assert!(tier.attempt(&request(6)).await.is_err());
        assert!(tier.attempt(&request(6)).await.is_err());
        assert_eq!(tier.readiness("Maize"), ModelReadiness::Failed);
    }

    #[tokio::test]
    async fn test_model_tier_trains_once_then_forecasts() {
        let mut service = MockModelService::new();
        service.expect_train().times(1).returning(|_| Ok(()));
        service.expect_forecast().times(2).returning(|_, h| {
            Ok((1..=h as i32).map(|i| ForecastPoint::new(2030 + i, 50.0)).collect())
        });

        let mut tier = ModelTier::new(Arc::new(service));
        assert_eq!(tier.attempt(&request(6)).await.unwrap().len(), 6);
        assert_eq!(tier.attempt(&request(1)).await.unwrap().len(), 1);
        assert_eq!(tier.readiness("Maize"), ModelReadiness::Ready);
    }

    #[tokio::test]
    async fn test_model_tier_forecast_error_disables_model() {
        let mut service = MockModelService::new();
        service.expect_train().times(1).returning(|_| Ok(()));
        service
            .expect_forecast()
            .times(1)
            .returning(|_, _| Err(AgriflowError::QueryFailed("timeout".into())));

        let mut tier = ModelTier::new(Arc::new(service));
        assert!(tier.attempt(&request(6)).await.is_err());
        assert!(tier.attempt(&request(6)).await.is_err());
        assert_eq!(tier.readiness("Maize"), ModelReadiness::Failed);
    }

    #[tokio::test]
    async fn test_spot_tier_is_flat() {
        let mut tier = SpotPriceTier;
        let points = tier.attempt(&request(6)).await.unwrap();
        assert_eq!(points.len(), 6);
        assert!(points.iter().all(|p| p.price == 0.425));
        assert!(points.windows(2).all(|w| w[1].year == w[0].year + 1));

        let missing = ForecastRequest {
            commodity: "Maize",
            country_iso: "ZWE",
            horizon: 6,
        };
        assert!(tier.attempt(&missing).await.unwrap().is_empty());
    }

    #[test]
    fn test_stub_stays_within_jitter() {
        let stub = StubTier::new(100.0, 10.0);
        let points = stub.generate(12);
        assert_eq!(points.len(), 12);
        assert!(points.iter().all(|p| (90.0..=110.0).contains(&p.price)));
    }
}
