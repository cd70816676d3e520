use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Route risk level from the conflict stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Conflict event near a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEvent {
    pub date: NaiveDate,
    pub event: String,
    pub sub_event: String,
    pub fatalities: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// Distance from the route's first stop (km)
    #[serde(default)]
    pub distance_km: Option<f64>,
    /// min(1, fatalities / 10)
    #[serde(default)]
    pub severity: Option<f64>,
}

/// Minimal route shape: what a caller can seed and what the conflict stage reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedRoute {
    pub truck_id: String,
    #[serde(default)]
    pub stops: Vec<String>,
}

/// Risk assessment of one route, keyed by truck id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub route: PlannedRoute,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub conflicts: Vec<ConflictEvent>,
}

impl RiskAssessment {
    pub fn low(route: PlannedRoute) -> Self {
        Self {
            route,
            risk_level: RiskLevel::Low,
            conflicts: Vec::new(),
        }
    }
}

/// A planned truck route with cost, time and risk enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub truck_id: String,
    /// Farm ids in visiting order (depot excluded)
    pub stops: Vec<String>,
    /// Solved tour length, including the closing arc back to the depot
    pub distance_km: f64,
    /// Last stop → end coordinate, road-snapped when possible
    pub final_leg_km: f64,
    pub total_km: f64,
    pub eta_hours: f64,
    pub rest_stops: u32,
    pub risk_level: RiskLevel,
    pub conflicts: Vec<ConflictEvent>,
    /// Whether a risk assessment existed for this truck; `low` alone cannot tell
    pub risk_evaluated: bool,
    pub fuel_usd: Decimal,
    pub cost_per_tonne: Decimal,
}

impl Route {
    pub fn planned(&self) -> PlannedRoute {
        PlannedRoute {
            truck_id: self.truck_id.clone(),
            stops: self.stops.clone(),
        }
    }
}
