use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on concurrently running agents in the parallel stage
    pub parallel_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_workers: 3,
        }
    }
}

/// Pump fuel used to price a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelKind {
    Diesel,
    Petrol,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Number of trucks the solver plans for
    pub fleet_size: usize,
    /// Wall-clock search budget for the solver (ms)
    pub search_time_limit_ms: u64,
    /// Average truck speed used for ETA
    pub average_speed_kmh: f64,
    /// Driving distance between mandatory rest stops
    pub rest_interval_km: f64,
    pub fuel_efficiency_km_per_litre: f64,
    /// Pump price used for countries missing from the reference table (USD/L)
    pub default_pump_price_usd: Decimal,
    pub fuel: FuelKind,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            fleet_size: 2,
            search_time_limit_ms: 5_000,
            average_speed_kmh: 60.0,
            rest_interval_km: 500.0,
            fuel_efficiency_km_per_litre: 3.0,
            default_pump_price_usd: dec!(1.35),
            fuel: FuelKind::Diesel,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Trailing moving-average window (periods)
    pub rolling_window: usize,
    /// Horizon used when the seed does not provide one
    pub default_horizon: usize,
    pub stub_base_price: f64,
    /// Stub prices are drawn uniformly from base ± jitter
    pub stub_jitter: f64,
    /// Fuel series driving the rolling-trend slope
    pub fuel_type: String,
    /// Divides the averaged fuel price into a per-period growth rate
    pub trend_divisor: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            rolling_window: 5,
            default_horizon: 12,
            stub_base_price: 100.0,
            stub_jitter: 10.0,
            fuel_type: "Diesel".to_string(),
            trend_divisor: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL (None = run against an empty in-memory store)
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific file (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("AGRIFLOW_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // AGRIFLOW__ROUTING__FLEET_SIZE=3, etc.
            .add_source(
                Environment::with_prefix("AGRIFLOW")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.pipeline.parallel_workers == 0 {
            errors.push("parallel_workers must be at least 1".to_string());
        }

        if self.routing.fleet_size == 0 {
            errors.push("fleet_size must be at least 1".to_string());
        }
        if self.routing.average_speed_kmh <= 0.0 {
            errors.push("average_speed_kmh must be positive".to_string());
        }
        if self.routing.rest_interval_km <= 0.0 {
            errors.push("rest_interval_km must be positive".to_string());
        }
        if self.routing.fuel_efficiency_km_per_litre <= 0.0 {
            errors.push("fuel_efficiency_km_per_litre must be positive".to_string());
        }
        if self.routing.default_pump_price_usd <= Decimal::ZERO {
            errors.push("default_pump_price_usd must be positive".to_string());
        }

        if self.forecast.rolling_window == 0 {
            errors.push("rolling_window must be at least 1".to_string());
        }
        if self.forecast.default_horizon == 0 {
            errors.push("default_horizon must be at least 1".to_string());
        }
        if self.forecast.stub_jitter < 0.0 || self.forecast.stub_jitter >= self.forecast.stub_base_price
        {
            errors.push(format!(
                "stub_jitter must be in [0, stub_base_price): {}",
                self.forecast.stub_jitter
            ));
        }
        if self.forecast.trend_divisor == 0.0 {
            errors.push("trend_divisor must be non-zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.routing.fleet_size, 2);
        assert_eq!(cfg.routing.search_time_limit_ms, 5_000);
        assert_eq!(cfg.forecast.rolling_window, 5);
        assert_eq!(cfg.routing.default_pump_price_usd, dec!(1.35));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut cfg = AppConfig::default();
        cfg.routing.fleet_size = 0;
        cfg.routing.average_speed_kmh = 0.0;
        cfg.forecast.stub_jitter = 200.0;

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_load_from_missing_dir_uses_defaults() {
        let cfg = AppConfig::load_from("/nonexistent/agriflow-config").unwrap();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.pipeline.parallel_workers, 3);
    }
}
