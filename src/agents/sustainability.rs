use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Agent;
use crate::domain::{keys, PipelineState};
use crate::error::Result;

/// kg CO₂ per litre of diesel
pub const CARBON_KG_PER_LITRE: f64 = 2.68;
pub const FUEL_EFFICIENCY_KM_PER_LITRE: f64 = 3.0;
pub const SOCIAL_IMPACT_SCORE: f64 = 0.75;
const DEFAULT_WATER_FACTOR: f64 = 1500.0;
/// Carbon total above which a route review is recommended (kg CO₂)
const CARBON_ALERT_KG: f64 = 5000.0;

// Litres of water per kg of produce
const WATER_FACTORS: &[(&str, f64)] = &[
    ("Barley", 1425.0),
    ("Beans, dry", 5000.0),
    ("Beef", 15400.0),
    ("Cabbages", 200.0),
    ("Cereals n.e.c.", 2000.0),
    ("Cow peas, dry", 4800.0),
    ("Maize", 1222.0),
    ("Maize (corn)", 1222.0),
    ("Meat of cattle with the bone, fresh or chilled", 15400.0),
    ("Meat of chickens, fresh or chilled", 4300.0),
    ("Meat of goat, fresh or chilled", 8800.0),
    ("Meat of pig with the bone, fresh or chilled", 6000.0),
    ("Meat of sheep, fresh or chilled", 10400.0),
    ("Millet", 4500.0),
    ("Potatoes", 250.0),
    ("Raw milk of cattle", 1000.0),
    ("Rice", 4000.0),
    ("Sorghum", 2865.0),
    ("Soya beans", 2000.0),
    ("Spinach", 300.0),
    ("Sugar cane", 200.0),
    ("Sunflower seed", 3300.0),
    ("Tomatoes", 180.0),
    ("Wheat", 1827.0),
];

pub fn water_factor(commodity: &str) -> f64 {
    WATER_FACTORS
        .iter()
        .find(|(name, _)| *name == commodity)
        .map(|(_, f)| *f)
        .unwrap_or(DEFAULT_WATER_FACTOR)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 0.9 => Grade::APlus,
            s if s >= 0.8 => Grade::A,
            s if s >= 0.7 => Grade::B,
            s if s >= 0.6 => Grade::C,
            s if s >= 0.5 => Grade::D,
            _ => Grade::F,
        }
    }

    /// Weight used for the overall score
    pub fn weight(self) -> f64 {
        match self {
            Grade::APlus => 1.0,
            Grade::A => 0.9,
            Grade::B => 0.8,
            Grade::C => 0.7,
            Grade::D => 0.6,
            Grade::F => 0.4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

/// Per-route sustainability figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSustainability {
    pub truck_id: String,
    pub carbon_footprint_kg_co2: f64,
    pub estimated_water_usage_liters: f64,
    pub social_impact_score: f64,
    pub sustainability_grade: Grade,
}

// Only what scoring needs, so seed-shaped routes still score
#[derive(Debug, Deserialize)]
struct RouteDistance {
    truck_id: String,
    #[serde(default)]
    total_km: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn score_route(truck_id: &str, total_km: f64, payload_tonnes: f64, commodity: &str) -> RouteSustainability {
    let litres = total_km / FUEL_EFFICIENCY_KM_PER_LITRE;
    let carbon = litres * CARBON_KG_PER_LITRE;
    let water = payload_tonnes * 1000.0 * water_factor(commodity);

    let carbon_score = (1.0 - carbon / 10_000.0).max(0.0);
    let water_score = (1.0 - water / 5e7).max(0.0);
    let score = 0.4 * carbon_score + 0.3 * water_score + 0.3 * SOCIAL_IMPACT_SCORE;

    RouteSustainability {
        truck_id: truck_id.to_string(),
        carbon_footprint_kg_co2: round2(carbon),
        estimated_water_usage_liters: round2(water),
        social_impact_score: SOCIAL_IMPACT_SCORE,
        sustainability_grade: Grade::from_score(score),
    }
}

pub fn recommendations(metrics: &[RouteSustainability]) -> Vec<String> {
    let mut recs = Vec::new();
    let carbon: f64 = metrics.iter().map(|m| m.carbon_footprint_kg_co2).sum();
    if carbon > CARBON_ALERT_KG {
        recs.push("High carbon footprint: optimise routes or use greener trucks.".to_string());
    }
    for m in metrics {
        if matches!(m.sustainability_grade, Grade::D | Grade::F) {
            recs.push(format!(
                "Truck {} graded {}: review distance and load.",
                m.truck_id,
                m.sustainability_grade.as_str()
            ));
        }
    }
    if recs.is_empty() {
        recs.push("Metrics within acceptable range.".to_string());
    }
    recs
}

/// Carbon, water and social scoring of the planned routes
#[derive(Debug, Default)]
pub struct SustainabilityAgent;

impl SustainabilityAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for SustainabilityAgent {
    fn id(&self) -> &str {
        "sustainability"
    }

    fn name(&self) -> &str {
        "Sustainability"
    }

    async fn process(&mut self, mut state: PipelineState) -> Result<PipelineState> {
        let routes: Vec<RouteDistance> = state.get_as(keys::ROUTES)?.unwrap_or_default();
        let payload: f64 = state.get_as(keys::PAYLOAD_TONNES)?.unwrap_or(10.0);
        let commodity = state
            .get_as::<Vec<String>>(keys::COMMODITIES)?
            .and_then(|c| c.into_iter().next())
            .unwrap_or_default();

        let metrics: Vec<RouteSustainability> = routes
            .iter()
            .map(|r| score_route(&r.truck_id, r.total_km, payload, &commodity))
            .collect();
        let overall = if metrics.is_empty() {
            0.0
        } else {
            round2(metrics.iter().map(|m| m.sustainability_grade.weight()).sum::<f64>() / metrics.len() as f64)
        };
        let carbon: f64 = metrics.iter().map(|m| m.carbon_footprint_kg_co2).sum();
        info!("Sustainability: {} routes, overall {:.2}, {:.1} kg CO2", metrics.len(), overall, carbon);

        state.set(keys::SUSTAINABILITY_RECOMMENDATIONS, &recommendations(&metrics))?;
        state.set(keys::SUSTAINABILITY_METRICS, &metrics)?;
        state.set(keys::OVERALL_SUSTAINABILITY_SCORE, &overall)?;
        state.set(keys::TOTAL_CARBON_FOOTPRINT, &carbon)?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(Grade::from_score(0.95), Grade::APlus);
        assert_eq!(Grade::from_score(0.8), Grade::A);
        assert_eq!(Grade::from_score(0.49), Grade::F);
        assert_eq!(serde_json::to_value(Grade::APlus).unwrap(), json!("A+"));
    }

    #[test]
    fn test_score_route() {
        // 300 km -> 100 L -> 268 kg; 10 t maize -> 12.22 ML of water
        let m = score_route("T1", 300.0, 10.0, "Maize");
        assert_eq!(m.carbon_footprint_kg_co2, 268.0);
        assert_eq!(m.estimated_water_usage_liters, 12_220_000.0);
        // 0.4*0.9732 + 0.3*0.7556 + 0.225 = 0.8410
        assert_eq!(m.sustainability_grade, Grade::A);
        assert_eq!(water_factor("Quinoa"), 1500.0);
    }

    #[tokio::test]
    async fn test_no_routes_scores_zero() {
        let mut agent = SustainabilityAgent::new();
        let out = agent.process(PipelineState::new()).await.unwrap();
        assert_eq!(out.require::<f64>(keys::OVERALL_SUSTAINABILITY_SCORE).unwrap(), 0.0);
        assert_eq!(out.require::<f64>(keys::TOTAL_CARBON_FOOTPRINT).unwrap(), 0.0);
        let recs: Vec<String> = out.require(keys::SUSTAINABILITY_RECOMMENDATIONS).unwrap();
        assert_eq!(recs.len(), 1);
    }

    #[tokio::test]
    async fn test_long_route_flagged() {
        let state = PipelineState::new()
            .with(
                keys::ROUTES,
                &json!([{"truck_id": "T1", "total_km": 30000.0}, {"truck_id": "T2", "stops": []}]),
            )
            .unwrap()
            .with(keys::COMMODITIES, &["Beef"])
            .unwrap();
        let mut agent = SustainabilityAgent::new();
        let out = agent.process(state).await.unwrap();

        let metrics: Vec<RouteSustainability> = out.require(keys::SUSTAINABILITY_METRICS).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].carbon_footprint_kg_co2, 0.0);
        let recs: Vec<String> = out.require(keys::SUSTAINABILITY_RECOMMENDATIONS).unwrap();
        assert!(recs[0].starts_with("High carbon footprint"));
        assert!(recs.iter().any(|r| r.contains("Truck T1")));
    }
}
