use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::Agent;
use crate::adapters::{FieldAverages, QueryService};
use crate::domain::{keys, PipelineState};
use crate::error::Result;

/// Window length looked back from the latest precipitation date
pub const LOOKBACK_DAYS: i64 = 30;

/// Field condition over the lookback window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRisk {
    Drought,
    Flood,
    Normal,
}

impl FieldRisk {
    /// Drought below 2 mm / 30 %, flood above 8 mm / 80 %; missing data is normal
    pub fn classify(averages: FieldAverages) -> Self {
        match (averages.precip_mm, averages.soil_moisture_pct) {
            (Some(pr), Some(sm)) if pr < 2.0 && sm < 30.0 => FieldRisk::Drought,
            (Some(pr), Some(sm)) if pr > 8.0 && sm > 80.0 => FieldRisk::Flood,
            _ => FieldRisk::Normal,
        }
    }
}

/// Drought/flood screening over the most recent 30 days of data
pub struct FieldRiskAgent {
    store: Arc<dyn QueryService>,
}

impl FieldRiskAgent {
    pub fn new(store: Arc<dyn QueryService>) -> Self {
        Self { store }
    }

    fn fallback_end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 12, 31).unwrap_or_default()
    }

    async fn window_end(&self, iso: &str) -> Result<NaiveDate> {
        match self.store.latest_precip_date(iso).await {
            Ok(Some(date)) => Ok(date),
            Ok(None) => Ok(Self::fallback_end()),
            Err(e) if e.is_data_unavailable() => {
                warn!("No precipitation data for {}: {}", iso, e);
                Ok(Self::fallback_end())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Agent for FieldRiskAgent {
    fn id(&self) -> &str {
        "field_risk"
    }

    fn name(&self) -> &str {
        "Field Risk"
    }

    async fn process(&mut self, mut state: PipelineState) -> Result<PipelineState> {
        let iso: String = state.require(keys::COUNTRY_ISO)?;
        let end = self.window_end(&iso).await?;
        let start = end - Duration::days(LOOKBACK_DAYS);

        let averages = match self.store.field_averages(&iso, start, end).await {
            Ok(a) => a,
            Err(e) if e.is_data_unavailable() => FieldAverages::default(),
            Err(e) => return Err(e),
        };
        let risk = FieldRisk::classify(averages);
        info!("Field risk for {} over {}..{}: {:?}", iso, start, end, risk);

        state.set(keys::FIELD_RISK, &risk)?;
        state.set(keys::FIELD_RISK_WINDOW, &format!("{start} → {end}"))?;
        Ok(state)
    }
}
