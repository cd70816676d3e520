//! Trained-model service consulted by the top forecast tier.
//!
//! The cascade only depends on `ModelService`; `TrendModelService` is the
//! in-process backend (least-squares price trend per commodity).

pub mod trend;

use async_trait::async_trait;

use crate::domain::ForecastPoint;
use crate::error::Result;

pub use trend::{LinearTrendModel, TrendModelService};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelService: Send + Sync {
    /// (Re)train the commodity's model from its price history
    async fn train(&self, commodity: &str) -> Result<()>;

    /// Project `horizon` future yearly prices from a trained model
    async fn forecast(&self, commodity: &str, horizon: usize) -> Result<Vec<ForecastPoint>>;
}
