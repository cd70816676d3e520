use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info, instrument};

use super::{BoundingBox, FieldAverages, PriceObservation, QueryService, WeatherDay};
use crate::domain::ConflictEvent;
use crate::error::Result;

const PRECIP_T: &str = "precip_sadc";
const SOIL_T: &str = "soil_moist_sadc";
const TMAX_T: &str = "temp_sadc";
const ACLED_T: &str = "acled_events_sadc";
const COMMODITY_T: &str = "commodity_prices_sadc";
const FUEL_T: &str = "fuel_price_sadc";
const ROAD_T: &str = "road_network_sadc";

/// PostgreSQL analytical store
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryService for PostgresStore {
    #[instrument(skip(self))]
    async fn latest_precip_date(&self, country_iso: &str) -> Result<Option<NaiveDate>> {
        let row = sqlx::query(&format!(
            "SELECT MAX(date::date) AS max_d FROM {PRECIP_T} WHERE country_iso = $1"
        ))
        .bind(country_iso)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<Option<NaiveDate>, _>("max_d")?)
    }

    #[instrument(skip(self))]
    async fn field_averages(
        &self,
        country_iso: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FieldAverages> {
        let row = sqlx::query(&format!(
            r#"
            SELECT
                (SELECT AVG(value)::float8 FROM {PRECIP_T}
                  WHERE country_iso = $1 AND date::date BETWEEN $2 AND $3) AS avg_precip,
                (SELECT AVG(value)::float8 FROM {SOIL_T}
                  WHERE country_iso = $1 AND date::date BETWEEN $2 AND $3) AS avg_soil
            "#
        ))
        .bind(country_iso)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(FieldAverages {
            precip_mm: row.try_get("avg_precip")?,
            soil_moisture_pct: row.try_get("avg_soil")?,
        })
    }

    #[instrument(skip(self))]
    async fn daily_weather(
        &self,
        country_iso: &str,
        start: NaiveDate,
        days: u32,
    ) -> Result<Vec<WeatherDay>> {
        let rows = sqlx::query(&format!(
            r#"
            WITH pr AS (
              SELECT date::date AS d, AVG(value)::float8 AS pr FROM {PRECIP_T}
              WHERE country_iso = $1 AND date::date BETWEEN $2 AND $2 + $3
              GROUP BY d
            ),
            sm AS (
              SELECT date::date AS d, AVG(value)::float8 AS sm FROM {SOIL_T}
              WHERE country_iso = $1 AND date::date BETWEEN $2 AND $2 + $3
              GROUP BY d
            ),
            tx AS (
              SELECT date::date AS d, AVG(value)::float8 AS tmax FROM {TMAX_T}
              WHERE country_iso = $1 AND date::date BETWEEN $2 AND $2 + $3
              GROUP BY d
            )
            SELECT COALESCE(pr.d, sm.d, tx.d) AS date, pr.pr, sm.sm, tx.tmax
            FROM pr
            FULL OUTER JOIN sm ON pr.d = sm.d
            FULL OUTER JOIN tx ON COALESCE(pr.d, sm.d) = tx.d
            ORDER BY date
            "#
        ))
        .bind(country_iso)
        .bind(start)
        .bind(days as i32)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| {
                Ok(WeatherDay {
                    date: r.try_get("date")?,
                    precip_mm: r.try_get("pr")?,
                    soil_moisture_pct: r.try_get("sm")?,
                    tmax_c: r.try_get("tmax")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn conflict_events(
        &self,
        bbox: BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ConflictEvent>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT date::date AS date, event, sub_event, fatalities::int4 AS fatalities,
                   lat::float8 AS latitude, lon::float8 AS longitude
            FROM {ACLED_T}
            WHERE date::date BETWEEN $1 AND $2
              AND lat BETWEEN $3 AND $4
              AND lon BETWEEN $5 AND $6
            "#
        ))
        .bind(start)
        .bind(end)
        .bind(bbox.lat_min)
        .bind(bbox.lat_max)
        .bind(bbox.lon_min)
        .bind(bbox.lon_max)
        .fetch_all(&self.pool)
        .await?;

        debug!("{} conflict events in {:?}", rows.len(), bbox);

        rows.iter()
            .map(|r| {
                Ok(ConflictEvent {
                    date: r.try_get("date")?,
                    event: r.try_get("event")?,
                    sub_event: r.try_get("sub_event")?,
                    fatalities: r.try_get::<i32, _>("fatalities")?.max(0) as u32,
                    latitude: r.try_get("latitude")?,
                    longitude: r.try_get("longitude")?,
                    distance_km: None,
                    severity: None,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn commodity_prices(&self, commodity: &str) -> Result<Vec<PriceObservation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT year::int4 AS year, AVG(price_usd_per_tonne)::float8 AS price
            FROM {COMMODITY_T}
            WHERE LOWER(commodity) = LOWER($1)
            GROUP BY year
            ORDER BY year
            "#
        ))
        .bind(commodity)
        .fetch_all(&self.pool)
        .await?;

        price_rows(&rows)
    }

    #[instrument(skip(self))]
    async fn fuel_prices(&self, fuel_type: &str) -> Result<Vec<PriceObservation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT year::int4 AS year, AVG(value::float8) AS price
            FROM {FUEL_T}
            WHERE fuel_type = $1
            GROUP BY year
            ORDER BY year
            "#
        ))
        .bind(fuel_type)
        .fetch_all(&self.pool)
        .await?;

        price_rows(&rows)
    }

    #[instrument(skip(self))]
    async fn road_segments(&self, country_iso: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!(
            "SELECT wkt FROM {ROAD_T} WHERE country_iso = $1"
        ))
        .bind(country_iso)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| Ok(r.try_get::<String, _>("wkt")?))
            .collect()
    }
}

fn price_rows(rows: &[sqlx::postgres::PgRow]) -> Result<Vec<PriceObservation>> {
    rows.iter()
        .filter_map(|r| {
            let year: i32 = match r.try_get("year") {
                Ok(y) => y,
                Err(e) => return Some(Err(e.into())),
            };
            match r.try_get::<Option<f64>, _>("price") {
                Ok(Some(price)) => Some(Ok(PriceObservation { year, price })),
                Ok(None) => None,
                Err(e) => Some(Err(e.into())),
            }
        })
        .collect()
}
