use thiserror::Error;

/// Main error type for the planner
#[derive(Error, Debug)]
pub enum AgriflowError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    // Upstream data errors
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    // Pipeline state errors
    #[error("Invalid pipeline state: {0}")]
    InvalidState(String),

    #[error("Agent {agent} failed: {reason}")]
    AgentFailure { agent: String, reason: String },

    // Routing errors
    #[error("Solver error: {0}")]
    Solver(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgriflowError {
    /// True when the upstream table, row set or model simply does not exist.
    ///
    /// Callers degrade to the next fallback on these without treating them as faults.
    pub fn is_data_unavailable(&self) -> bool {
        match self {
            AgriflowError::DataUnavailable(_) | AgriflowError::ModelUnavailable(_) => true,
            AgriflowError::Database(sqlx::Error::RowNotFound) => true,
            // 42P01 = undefined_table
            AgriflowError::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some("42P01")
            }
            _ => false,
        }
    }
}

/// Result type alias for AgriflowError
pub type Result<T> = std::result::Result<T, AgriflowError>;
