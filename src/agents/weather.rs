use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::Agent;
use crate::adapters::{QueryService, WeatherDay};
use crate::domain::{keys, PipelineState};
use crate::error::Result;

pub const DEFAULT_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherTag {
    GoodHarvestWindow,
    HighFloodRisk,
    Normal,
}

/// One day of the country-wide outlook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlookDay {
    pub date: NaiveDate,
    pub precip_mm: Option<f64>,
    pub soil_moisture_pct: Option<f64>,
    pub tmax_c: Option<f64>,
    pub tag: Option<WeatherTag>,
}

impl From<WeatherDay> for OutlookDay {
    fn from(day: WeatherDay) -> Self {
        let tag = match (day.precip_mm, day.soil_moisture_pct) {
            (Some(pr), Some(sm)) if pr < 2.0 && sm < 60.0 => WeatherTag::GoodHarvestWindow,
            (Some(pr), Some(sm)) if pr > 10.0 && sm > 80.0 => WeatherTag::HighFloodRisk,
            _ => WeatherTag::Normal,
        };
        Self {
            date: day.date,
            precip_mm: day.precip_mm,
            soil_moisture_pct: day.soil_moisture_pct,
            tmax_c: day.tmax_c,
            tag: Some(tag),
        }
    }
}

/// Deterministic outlook used when the weather tables do not exist
pub fn mock_outlook(start: NaiveDate, days: u32) -> Vec<OutlookDay> {
    (0..days)
        .map(|i| OutlookDay {
            date: start + Duration::days(i64::from(i)),
            precip_mm: Some(0.0),
            soil_moisture_pct: Some(50.0),
            tmax_c: Some(30.0),
            tag: matches!(i, 2 | 3).then_some(WeatherTag::GoodHarvestWindow),
        })
        .collect()
}

/// Daily precipitation / soil / temperature outlook with harvest tags
pub struct WeatherAgent {
    store: Arc<dyn QueryService>,
}

impl WeatherAgent {
    pub fn new(store: Arc<dyn QueryService>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Agent for WeatherAgent {
    fn id(&self) -> &str {
        "weather"
    }

    fn name(&self) -> &str {
        "Weather Outlook"
    }

    async fn process(&mut self, mut state: PipelineState) -> Result<PipelineState> {
        let iso: String = state.require(keys::COUNTRY_ISO)?;
        let start: NaiveDate = state
            .get_as(keys::WEATHER_START)?
            .unwrap_or_else(|| Utc::now().date_naive());
        let days: u32 = state.get_as(keys::WEATHER_DAYS)?.unwrap_or(DEFAULT_DAYS);

        let outlook = match self.store.daily_weather(&iso, start, days).await {
            Ok(rows) => rows.into_iter().map(OutlookDay::from).collect(),
            Err(e) if e.is_data_unavailable() => {
                warn!("Weather tables missing for {}, using mock outlook: {}", iso, e);
                mock_outlook(start, days)
            }
            Err(e) => return Err(e),
        };
        info!("Weather outlook for {}: {} days from {}", iso, outlook.len(), start);

        state.set(keys::WEATHER_OUTLOOK, &outlook)?;
        Ok(state)
    }
}
