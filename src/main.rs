use agriflow::adapters::{InMemoryStore, PostgresStore, QueryService};
use agriflow::config::AppConfig;
use agriflow::domain::{keys, PipelineSeed, Route};
use agriflow::error::{AgriflowError, Result};
use agriflow::ml::TrendModelService;
use agriflow::pipeline::Pipeline;
use agriflow::reference;
use agriflow::spatial::Coord;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "agriflow")]
#[command(about = "Agricultural supply-chain planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one country
    Plan {
        /// ISO3 country code
        #[arg(long, default_value = "BWA")]
        country: String,
        /// Comma-separated commodity list
        #[arg(long, value_delimiter = ',', default_value = "Maize")]
        commodities: Vec<String>,
        /// Forecast horizon (defaults to forecast.default_horizon)
        #[arg(long)]
        horizon: Option<usize>,
        /// Payload per truck in tonnes
        #[arg(long, default_value = "10")]
        payload: f64,
        #[arg(long, default_value = "-24.65", allow_hyphen_values = true)]
        start_lat: f64,
        #[arg(long, default_value = "25.91", allow_hyphen_values = true)]
        start_lon: f64,
        #[arg(long, default_value = "-25.90", allow_hyphen_values = true)]
        end_lat: f64,
        #[arg(long, default_value = "28.20", allow_hyphen_values = true)]
        end_lon: f64,
        /// Uniform forecast shift in percent
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        price_shift: f64,
        /// Configuration directory
        #[arg(long, default_value = "config")]
        config_dir: String,
        /// Print a route table instead of the JSON state
        #[arg(long)]
        table: bool,
    },
    /// List the demo farms of a country
    Farms {
        /// ISO3 country code
        iso: String,
    },
}

#[derive(Tabled)]
struct RouteRow {
    truck: String,
    stops: String,
    total_km: f64,
    eta_h: f64,
    rest_stops: u32,
    risk: String,
    fuel_usd: String,
    usd_per_tonne: String,
}

impl From<&Route> for RouteRow {
    fn from(r: &Route) -> Self {
        Self {
            truck: r.truck_id.clone(),
            stops: if r.stops.is_empty() {
                "-".to_string()
            } else {
                r.stops.join(" → ")
            },
            total_km: r.total_km,
            eta_h: r.eta_hours,
            rest_stops: r.rest_stops,
            risk: if r.risk_evaluated {
                r.risk_level.as_str().to_string()
            } else {
                format!("{} (unassessed)", r.risk_level.as_str())
            },
            fuel_usd: r.fuel_usd.to_string(),
            usd_per_tonne: r.cost_per_tonne.to_string(),
        }
    }
}

#[derive(Tabled)]
struct FarmRow {
    farm: String,
    lat: f64,
    lon: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            country,
            commodities,
            horizon,
            payload,
            start_lat,
            start_lon,
            end_lat,
            end_lon,
            price_shift,
            config_dir,
            table,
        } => {
            let config = AppConfig::load_from(&config_dir)?;
            init_logging(&config);
            config
                .validate()
                .map_err(|errors| AgriflowError::Validation(errors.join("; ")))?;

            let country = country.to_ascii_uppercase();
            let farm_coords = reference::demo_farms(&country).ok_or_else(|| {
                AgriflowError::Validation(format!("no demo farms for country {country}"))
            })?;
            let seed = PipelineSeed {
                horizon: horizon.unwrap_or(config.forecast.default_horizon),
                country_iso: country,
                commodities,
                payload_tonnes: payload,
                start_coord: Coord::new(start_lat, start_lon),
                end_coord: Coord::new(end_lat, end_lon),
                farm_coords,
                price_shift,
                routes: Vec::new(),
            };
            run_plan(&config, seed, table).await?;
        }
        Commands::Farms { iso } => {
            init_logging_simple();
            let farms = reference::demo_farms(&iso)
                .ok_or_else(|| AgriflowError::Validation(format!("unknown country {iso}")))?;
            let rows: Vec<FarmRow> = farms
                .into_iter()
                .map(|(farm, c)| FarmRow {
                    farm,
                    lat: c.lat,
                    lon: c.lon,
                })
                .collect();
            let name = reference::country_name(&iso).unwrap_or("?");
            println!("{name} ({})", iso.to_ascii_uppercase());
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

async fn run_plan(config: &AppConfig, seed: PipelineSeed, table: bool) -> Result<()> {
    let store: Arc<dyn QueryService> = match &config.database.url {
        Some(url) => Arc::new(PostgresStore::new(url, config.database.max_connections).await?),
        None => {
            warn!("database.url not set, running against an empty in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };
    let models = Arc::new(TrendModelService::new(Arc::clone(&store)));

    let mut pipeline = Pipeline::standard(store, models, config);
    info!(agents = ?pipeline.agent_ids(), country = %seed.country_iso, "starting pipeline");

    let (state, report) = pipeline.run_with_report(seed.into_state()?).await;
    for failure in report.failures() {
        warn!(
            agent = %failure.agent,
            status = ?failure.status,
            error = failure.error.as_deref().unwrap_or(""),
            "agent did not contribute"
        );
    }

    if table {
        let routes: Vec<Route> = state.get_as(keys::ROUTES)?.unwrap_or_default();
        if routes.is_empty() {
            println!("(no routes)");
        } else {
            let rows: Vec<RouteRow> = routes.iter().map(RouteRow::from).collect();
            println!("{}", Table::new(rows));
        }
        if let Some(methods) = state.get(keys::COMMODITY_FORECAST_METHODS) {
            println!("forecast methods: {methods}");
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }
    Ok(())
}

fn init_logging(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},agriflow=debug,sqlx=warn", config.logging.level))
    });

    // File logging only when AGRIFLOW_LOG_DIR is set and writable.
    // `rolling::daily` panics if it cannot create the first file.
    let file_layer = std::env::var("AGRIFLOW_LOG_DIR").ok().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!("Warning: Could not create log directory {log_dir} ({e}), file logging disabled");
            return None;
        }
        let marker = std::path::Path::new(&log_dir).join(".agriflow_write_test");
        match std::fs::OpenOptions::new().create(true).append(true).open(&marker) {
            Ok(_) => {
                let _ = std::fs::remove_file(&marker);
                let appender = tracing_appender::rolling::daily(&log_dir, "agriflow.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!("Warning: Could not write to log directory {log_dir} ({e}), file logging disabled");
                None
            }
        }
    });

    let (text_console, json_console) = if config.logging.json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_console)
        .with(json_console)
        .with(file_layer)
        .init();
}

fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
