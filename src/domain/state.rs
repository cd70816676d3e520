//! Pipeline state: the string-keyed value threaded through every agent.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::route::PlannedRoute;
use crate::error::{AgriflowError, Result};
use crate::spatial::Coord;

/// Well-known state keys
pub mod keys {
    // Seed
    pub const COUNTRY_ISO: &str = "country_iso";
    pub const COMMODITIES: &str = "commodities";
    pub const HORIZON: &str = "horizon";
    pub const PAYLOAD_TONNES: &str = "payload_tonnes";
    pub const START_COORD: &str = "start_coord";
    pub const END_COORD: &str = "end_coord";
    pub const FARM_COORDS: &str = "farm_coords";
    /// Uniform forecast shift, in percent
    pub const PRICE_SHIFT: &str = "price_shift";
    pub const WEATHER_START: &str = "start";
    pub const WEATHER_DAYS: &str = "days";

    // Field risk
    pub const FIELD_RISK: &str = "field_risk";
    pub const FIELD_RISK_WINDOW: &str = "field_risk_window";

    // Weather
    pub const WEATHER_OUTLOOK: &str = "weather_outlook";

    // Conflict risk
    pub const RISK_ASSESSMENTS: &str = "risk_assessments";

    // Forecast (per-commodity payload)
    pub const COMMODITY: &str = "commodity";
    pub const FORECAST: &str = "forecast";
    pub const METHOD_USED: &str = "method_used";
    pub const FORECAST_FALLBACKS: &str = "forecast_fallbacks";

    // Forecast (merged)
    pub const COMMODITY_FORECASTS: &str = "commodity_forecasts";
    pub const COMMODITY_FORECAST_METHODS: &str = "commodity_forecast_methods";
    pub const COMMODITY_FORECAST_FALLBACKS: &str = "commodity_forecast_fallbacks";

    // Routing
    pub const ROUTES: &str = "routes";
    pub const ROUTES_GENERATED_AT: &str = "routes_generated_at";

    // Sustainability
    pub const SUSTAINABILITY_METRICS: &str = "sustainability_metrics";
    pub const OVERALL_SUSTAINABILITY_SCORE: &str = "overall_sustainability_score";
    pub const TOTAL_CARBON_FOOTPRINT: &str = "total_carbon_footprint_kg_co2";
    pub const SUSTAINABILITY_RECOMMENDATIONS: &str = "sustainability_recommendations";

    // Learning
    pub const MODEL_CONFIDENCE: &str = "model_confidence";
    pub const LEARNING_ITERATION: &str = "learning_iteration";
}

/// Append-only string-keyed state.
///
/// No `remove`: agents add or overwrite keys and the orchestrator merges
/// whole states.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineState(BTreeMap<String, Value>);

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Insert or overwrite a raw value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Serialize and insert a typed value
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        self.0.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Builder form of [`set`](Self::set)
    pub fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Typed read. Missing or null → `Ok(None)`; wrong shape → `InvalidState`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => T::deserialize(v).map(Some).map_err(|e| {
                AgriflowError::InvalidState(format!("key '{key}' has unexpected shape: {e}"))
            }),
        }
    }

    /// Typed read of a key the caller cannot work without
    pub fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get_as(key)?
            .ok_or_else(|| AgriflowError::InvalidState(format!("missing required key '{key}'")))
    }

    /// Shallow merge: every key of `other` overwrites the same key here.
    pub fn merge(&mut self, other: PipelineState) {
        self.0.extend(other.0);
    }

    /// Keys that are new or changed relative to `base`
    pub fn changes_from(&self, base: &PipelineState) -> PipelineState {
        PipelineState(
            self.0
                .iter()
                .filter(|(k, v)| base.0.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for PipelineState {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

/// Caller-supplied inputs for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSeed {
    pub country_iso: String,
    pub commodities: Vec<String>,
    pub horizon: usize,
    pub payload_tonnes: f64,
    pub start_coord: Coord,
    pub end_coord: Coord,
    pub farm_coords: BTreeMap<String, Coord>,
    /// Uniform forecast shift in percent (5.0 = +5%)
    #[serde(default)]
    pub price_shift: f64,
    /// Previously planned routes, assessed by the conflict stage
    #[serde(default)]
    pub routes: Vec<PlannedRoute>,
}

impl PipelineSeed {
    pub fn into_state(self) -> Result<PipelineState> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(PipelineState(map.into_iter().collect())),
            other => Err(AgriflowError::Internal(format!(
                "seed serialized to non-object: {other}"
            ))),
        }
    }
}
