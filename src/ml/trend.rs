use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::ModelService;
use crate::adapters::{PriceObservation, QueryService};
use crate::domain::ForecastPoint;
use crate::error::{AgriflowError, Result};

/// Minimum distinct years needed to fit a trend
pub const MIN_TRAINING_YEARS: usize = 3;

/// Ordinary least-squares line `price = intercept + slope * year`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrendModel {
    pub intercept: f64,
    pub slope: f64,
    pub last_year: i32,
    pub r_squared: f64,
}

impl LinearTrendModel {
    pub fn fit(history: &[PriceObservation]) -> Result<Self> {
        let mut years: Vec<i32> = history.iter().map(|o| o.year).collect();
        years.sort_unstable();
        years.dedup();
        if years.len() < MIN_TRAINING_YEARS {
            return Err(AgriflowError::ModelUnavailable(format!(
                "need {MIN_TRAINING_YEARS} distinct years of history, got {}",
                years.len()
            )));
        }
        if history.iter().any(|o| !o.price.is_finite()) {
            return Err(AgriflowError::Validation(
                "price history contains non-finite values".to_string(),
            ));
        }

        let n = history.len() as f64;
        let mean_x = history.iter().map(|o| f64::from(o.year)).sum::<f64>() / n;
        let mean_y = history.iter().map(|o| o.price).sum::<f64>() / n;

        let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
        for o in history {
            let dx = f64::from(o.year) - mean_x;
            let dy = o.price - mean_y;
            sxy += dx * dy;
            sxx += dx * dx;
            syy += dy * dy;
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let r_squared = if syy == 0.0 { 1.0 } else { (sxy * sxy) / (sxx * syy) };

        Ok(Self {
            intercept,
            slope,
            last_year: years[years.len() - 1],
            r_squared,
        })
    }

    /// Yearly projection for the `horizon` years after the last observation
    pub fn forecast(&self, horizon: usize) -> Vec<ForecastPoint> {
        (1..=horizon as i32)
            .map(|i| {
                let year = self.last_year + i;
                let price = (self.intercept + self.slope * f64::from(year)).max(0.0);
                ForecastPoint::new(year, (price * 100.0).round() / 100.0)
            })
            .collect()
    }
}

/// Trains one trend model per commodity from the query service
pub struct TrendModelService {
    store: Arc<dyn QueryService>,
    models: RwLock<HashMap<String, LinearTrendModel>>,
}

impl TrendModelService {
    pub fn new(store: Arc<dyn QueryService>) -> Self {
        Self {
            store,
            models: RwLock::new(HashMap::new()),
        }
    }

    fn model_id(commodity: &str) -> String {
        commodity
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

#[async_trait]
impl ModelService for TrendModelService {
    async fn train(&self, commodity: &str) -> Result<()> {
        let history = self.store.commodity_prices(commodity).await?;
        let model = LinearTrendModel::fit(&history)?;
        info!(
            "Trained trend model {} (slope={:.3}, r2={:.3}, last_year={})",
            Self::model_id(commodity),
            model.slope,
            model.r_squared,
            model.last_year
        );
        self.models
            .write()
            .await
            .insert(Self::model_id(commodity), model);
        Ok(())
    }

    async fn forecast(&self, commodity: &str, horizon: usize) -> Result<Vec<ForecastPoint>> {
        let id = Self::model_id(commodity);
        let model = self
            .models
            .read()
            .await
            .get(&id)
            .copied()
            .ok_or_else(|| AgriflowError::ModelUnavailable(format!("model {id} not trained")))?;
        debug!("Forecasting {} years with {}", horizon, id);
        Ok(model.forecast(horizon))
    }
}
