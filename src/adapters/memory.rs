//! In-memory query service for tests and offline runs.
//!
//! Each table is `Option<Vec<_>>`: `None` behaves like a missing table
//! (`DataUnavailable`), `Some(vec![])` like an empty one.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};

use super::{BoundingBox, FieldAverages, PriceObservation, QueryService, WeatherDay};
use crate::domain::ConflictEvent;
use crate::error::{AgriflowError, Result};

/// One raster-cell reading (precip mm, soil %, tmax °C)
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReading {
    pub country_iso: String,
    pub date: NaiveDate,
    pub value: f64,
}

impl DailyReading {
    pub fn new(country_iso: &str, date: NaiveDate, value: f64) -> Self {
        Self {
            country_iso: country_iso.to_string(),
            date,
            value,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    precip: Option<Vec<DailyReading>>,
    soil: Option<Vec<DailyReading>>,
    tmax: Option<Vec<DailyReading>>,
    conflicts: Option<Vec<ConflictEvent>>,
    commodity_prices: Option<Vec<(String, PriceObservation)>>,
    fuel_prices: Option<Vec<(String, PriceObservation)>>,
    roads: Option<HashMap<String, Vec<String>>>,
    unreachable: bool,
}

impl InMemoryStore {
    /// A store where every table is missing
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query fails as if the backend could not be reached
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_precip(mut self, readings: Vec<DailyReading>) -> Self {
        self.precip.get_or_insert_with(Vec::new).extend(readings);
        self
    }

    pub fn with_soil_moisture(mut self, readings: Vec<DailyReading>) -> Self {
        self.soil.get_or_insert_with(Vec::new).extend(readings);
        self
    }

    pub fn with_tmax(mut self, readings: Vec<DailyReading>) -> Self {
        self.tmax.get_or_insert_with(Vec::new).extend(readings);
        self
    }

    pub fn with_conflicts(mut self, events: Vec<ConflictEvent>) -> Self {
        self.conflicts.get_or_insert_with(Vec::new).extend(events);
        self
    }

    pub fn with_commodity_prices(mut self, commodity: &str, prices: &[(i32, f64)]) -> Self {
        let table = self.commodity_prices.get_or_insert_with(Vec::new);
        table.extend(
            prices
                .iter()
                .map(|&(year, price)| (commodity.to_string(), PriceObservation { year, price })),
        );
        self
    }

    pub fn with_fuel_prices(mut self, fuel_type: &str, prices: &[(i32, f64)]) -> Self {
        let table = self.fuel_prices.get_or_insert_with(Vec::new);
        table.extend(
            prices
                .iter()
                .map(|&(year, price)| (fuel_type.to_string(), PriceObservation { year, price })),
        );
        self
    }

    pub fn with_roads(mut self, country_iso: &str, road_rows: Vec<String>) -> Self {
        self.roads
            .get_or_insert_with(HashMap::new)
            .entry(country_iso.to_string())
            .or_default()
            .extend(road_rows);
        self
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable {
            return Err(AgriflowError::QueryFailed(
                "in-memory store marked unreachable".to_string(),
            ));
        }
        Ok(())
    }
}

fn table<'a, T>(t: &'a Option<T>, name: &str) -> Result<&'a T> {
    t.as_ref()
        .ok_or_else(|| AgriflowError::DataUnavailable(format!("table {name} not found")))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn window_mean(
    readings: &[DailyReading],
    country_iso: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<f64> {
    mean(
        readings
            .iter()
            .filter(|r| r.country_iso == country_iso && r.date >= start && r.date <= end)
            .map(|r| r.value),
    )
}

fn daily_means(
    readings: &[DailyReading],
    country_iso: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> BTreeMap<NaiveDate, f64> {
    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for r in readings
        .iter()
        .filter(|r| r.country_iso == country_iso && r.date >= start && r.date <= end)
    {
        by_day.entry(r.date).or_default().push(r.value);
    }
    by_day
        .into_iter()
        .filter_map(|(d, vs)| mean(vs.into_iter()).map(|m| (d, m)))
        .collect()
}

fn yearly(rows: &[(String, PriceObservation)], matches: impl Fn(&str) -> bool) -> Vec<PriceObservation> {
    let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for (_, obs) in rows.iter().filter(|(name, _)| matches(name)) {
        by_year.entry(obs.year).or_default().push(obs.price);
    }
    by_year
        .into_iter()
        .filter_map(|(year, ps)| mean(ps.into_iter()).map(|price| PriceObservation { year, price }))
        .collect()
}

#[async_trait]
impl QueryService for InMemoryStore {
    async fn latest_precip_date(&self, country_iso: &str) -> Result<Option<NaiveDate>> {
        self.check_reachable()?;
        Ok(table(&self.precip, "precip")?
            .iter()
            .filter(|r| r.country_iso == country_iso)
            .map(|r| r.date)
            .max())
    }

    async fn field_averages(
        &self,
        country_iso: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FieldAverages> {
        self.check_reachable()?;
        Ok(FieldAverages {
            precip_mm: window_mean(table(&self.precip, "precip")?, country_iso, start, end),
            soil_moisture_pct: window_mean(table(&self.soil, "soil_moisture")?, country_iso, start, end),
        })
    }

    async fn daily_weather(
        &self,
        country_iso: &str,
        start: NaiveDate,
        days: u32,
    ) -> Result<Vec<WeatherDay>> {
        self.check_reachable()?;
        let end = start + Duration::days(i64::from(days));
        let pr = daily_means(table(&self.precip, "precip")?, country_iso, start, end);
        let sm = daily_means(table(&self.soil, "soil_moisture")?, country_iso, start, end);
        let tx = daily_means(table(&self.tmax, "tmax")?, country_iso, start, end);

        let mut dates: Vec<NaiveDate> = pr.keys().chain(sm.keys()).chain(tx.keys()).copied().collect();
        dates.sort();
        dates.dedup();

        Ok(dates
            .into_iter()
            .map(|date| WeatherDay {
                date,
                precip_mm: pr.get(&date).copied(),
                soil_moisture_pct: sm.get(&date).copied(),
                tmax_c: tx.get(&date).copied(),
            })
            .collect())
    }

    async fn conflict_events(
        &self,
        bbox: BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ConflictEvent>> {
        self.check_reachable()?;
        Ok(table(&self.conflicts, "acled_events")?
            .iter()
            .filter(|e| e.date >= start && e.date <= end && bbox.contains(e.latitude, e.longitude))
            .cloned()
            .collect())
    }

    async fn commodity_prices(&self, commodity: &str) -> Result<Vec<PriceObservation>> {
        self.check_reachable()?;
        let rows = table(&self.commodity_prices, "commodity_prices")?;
        Ok(yearly(rows, |name| name.eq_ignore_ascii_case(commodity)))
    }

    async fn fuel_prices(&self, fuel_type: &str) -> Result<Vec<PriceObservation>> {
        self.check_reachable()?;
        let rows = table(&self.fuel_prices, "fuel_prices")?;
        Ok(yearly(rows, |name| name == fuel_type))
    }

    async fn road_segments(&self, country_iso: &str) -> Result<Vec<String>> {
        self.check_reachable()?;
        Ok(table(&self.roads, "road_network")?
            .get(country_iso)
            .cloned()
            .unwrap_or_default())
    }
}
