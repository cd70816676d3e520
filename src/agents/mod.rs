//! Pipeline agents
//!
//! Each agent implements `Agent`: it takes the accumulated state and returns
//! it enriched with its own keys.

pub mod conflict;
pub mod field_risk;
pub mod forecast;
pub mod learning;
pub mod routing;
pub mod sustainability;
pub mod traits;
pub mod weather;

pub use conflict::ConflictRiskAgent;
pub use field_risk::{FieldRisk, FieldRiskAgent};
pub use forecast::ForecastAgent;
pub use learning::{Feedback, LearningAgent, OutcomeModel};
pub use routing::RoutingAgent;
pub use sustainability::{Grade, RouteSustainability, SustainabilityAgent};
pub use traits::Agent;
pub use weather::{OutlookDay, WeatherAgent, WeatherTag};
