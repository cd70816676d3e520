use serde::{Deserialize, Serialize};

/// One projected price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub year: i32,
    pub price: f64,
}

impl ForecastPoint {
    pub fn new(year: i32, price: f64) -> Self {
        Self { year, price }
    }
}

/// Cascade tier that produced a forecast, in cascade order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastTier {
    TrainedModel,
    RollingMean,
    SpotPrice,
    Stub,
}

impl ForecastTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastTier::TrainedModel => "trained_model",
            ForecastTier::RollingMean => "rolling_mean",
            ForecastTier::SpotPrice => "spot_price",
            ForecastTier::Stub => "stub",
        }
    }
}

impl std::fmt::Display for ForecastTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-commodity trained-model state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelReadiness {
    #[default]
    Untried,
    Ready,
    Failed,
}

/// Why a tier was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierFallback {
    pub tier: ForecastTier,
    pub reason: String,
}

/// Cascade output: exactly `horizon` points, tagged with the producing tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedForecast {
    pub commodity: String,
    pub tier: ForecastTier,
    pub points: Vec<ForecastPoint>,
    pub fallbacks: Vec<TierFallback>,
}
