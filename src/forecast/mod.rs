//! Price forecast cascade
//!
//! Four ordered strategies (trained model, rolling mean, spot reference,
//! stub); the first that yields a non-empty series wins and the result is
//! tagged with the tier that produced it.

pub mod cascade;
pub mod tiers;

use async_trait::async_trait;

use crate::domain::{ForecastPoint, ForecastTier};
use crate::error::Result;

pub use cascade::ForecastCascade;
pub use tiers::{moving_average, ModelTier, RollingMeanTier, SpotPriceTier, StubTier};

/// What a tier is asked to forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastRequest<'a> {
    pub commodity: &'a str,
    pub country_iso: &'a str,
    pub horizon: usize,
}

/// One "attempt forecast" strategy of the cascade.
///
/// `Ok(vec![])` and `Err(_)` both mean "this tier had nothing"; the cascade
/// records the reason and moves on.
#[async_trait]
pub trait ForecastStrategy: Send + Sync {
    fn tier(&self) -> ForecastTier;

    async fn attempt(&mut self, request: &ForecastRequest<'_>) -> Result<Vec<ForecastPoint>>;
}
