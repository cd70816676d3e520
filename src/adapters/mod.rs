//! Tabular query service: the analytical data the agents read.
//!
//! `PostgresStore` talks to the warehouse; `InMemoryStore` serves tests and
//! offline runs. Agents only see the `QueryService` trait.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::ConflictEvent;
use crate::error::Result;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Averages over a field-risk window; None when the window has no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAverages {
    pub precip_mm: Option<f64>,
    pub soil_moisture_pct: Option<f64>,
}

/// Country-wide daily weather aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
    pub date: NaiveDate,
    pub precip_mm: Option<f64>,
    pub soil_moisture_pct: Option<f64>,
    pub tmax_c: Option<f64>,
}

/// Yearly price observation (commodity USD/tonne or fuel USD/L)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub year: i32,
    pub price: f64,
}

/// Lat/lon bounding box, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&lat) && (self.lon_min..=self.lon_max).contains(&lon)
    }
}

/// Parameterized reads against the analytical store.
///
/// Implementations report a missing table as `DataUnavailable` and an
/// unreachable backend as `QueryFailed`/`Database`; callers decide how to degrade.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Most recent day with precipitation data for the country
    async fn latest_precip_date(&self, country_iso: &str) -> Result<Option<NaiveDate>>;

    /// Mean precipitation and soil moisture over `[start, end]`
    async fn field_averages(
        &self,
        country_iso: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FieldAverages>;

    /// Daily aggregates for `[start, start + days]`, ordered by date
    async fn daily_weather(
        &self,
        country_iso: &str,
        start: NaiveDate,
        days: u32,
    ) -> Result<Vec<WeatherDay>>;

    /// Conflict events inside `bbox` between `start` and `end`
    async fn conflict_events(
        &self,
        bbox: BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ConflictEvent>>;

    /// Yearly commodity prices (case-insensitive name), ordered by year
    async fn commodity_prices(&self, commodity: &str) -> Result<Vec<PriceObservation>>;

    /// Yearly fuel prices for one fuel type, ordered by year
    async fn fuel_prices(&self, fuel_type: &str) -> Result<Vec<PriceObservation>>;

    /// Road geometries for a country, one WKT string (or GeoJSON document) per row
    async fn road_segments(&self, country_iso: &str) -> Result<Vec<String>>;
}
