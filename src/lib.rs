pub mod adapters;
pub mod agents;
pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod ml;
pub mod pipeline;
pub mod reference;
pub mod routing;
pub mod spatial;

pub use adapters::{InMemoryStore, PostgresStore, QueryService};
pub use config::AppConfig;
pub use domain::{PipelineSeed, PipelineState, Route};
pub use error::{AgriflowError, Result};
pub use pipeline::{Pipeline, RunReport};
