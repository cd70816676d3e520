use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::Agent;
use crate::adapters::{BoundingBox, QueryService};
use crate::domain::{keys, ConflictEvent, PipelineState, PlannedRoute, RiskAssessment, RiskLevel};
use crate::error::Result;
use crate::spatial::{haversine_km, Coord};

/// Degrees added around the route's stops when searching for events
pub const BBOX_MARGIN_DEG: f64 = 0.5;
pub const LOOKBACK_DAYS: i64 = 90;

/// `high` above 10 fatalities or 5 events, `medium` with any event
pub fn risk_level(events: &[ConflictEvent]) -> RiskLevel {
    let fatalities: u32 = events.iter().map(|e| e.fatalities).sum();
    if fatalities > 10 || events.len() > 5 {
        RiskLevel::High
    } else if !events.is_empty() {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn bounding_box(points: &[Coord]) -> BoundingBox {
    let (mut lat_min, mut lat_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut lon_min, mut lon_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        lat_min = lat_min.min(p.lat);
        lat_max = lat_max.max(p.lat);
        lon_min = lon_min.min(p.lon);
        lon_max = lon_max.max(p.lon);
    }
    BoundingBox {
        lat_min: lat_min - BBOX_MARGIN_DEG,
        lat_max: lat_max + BBOX_MARGIN_DEG,
        lon_min: lon_min - BBOX_MARGIN_DEG,
        lon_max: lon_max + BBOX_MARGIN_DEG,
    }
}

/// Scores recent armed-conflict events around each planned route
pub struct ConflictRiskAgent {
    store: Arc<dyn QueryService>,
    as_of: Option<NaiveDate>,
}

impl ConflictRiskAgent {
    pub fn new(store: Arc<dyn QueryService>) -> Self {
        Self { store, as_of: None }
    }

    /// Pin "today" for the lookback window
    pub fn with_as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    async fn assess(&self, route: PlannedRoute, farms: &BTreeMap<String, Coord>) -> RiskAssessment {
        let points: Vec<Coord> = route
            .stops
            .iter()
            .filter_map(|id| farms.get(id).copied())
            .collect();
        let Some(&first) = points.first() else {
            return RiskAssessment::low(route);
        };

        let end = self.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let start = end - Duration::days(LOOKBACK_DAYS);
        let bbox = bounding_box(&points);

        let mut events = match self.store.conflict_events(bbox, start, end).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Conflict query for {} failed: {}", route.truck_id, e);
                Vec::new()
            }
        };
        for event in events.iter_mut() {
            let km = haversine_km(first, Coord::new(event.latitude, event.longitude));
            event.distance_km = Some((km * 10.0).round() / 10.0);
            event.severity = Some((f64::from(event.fatalities) / 10.0).min(1.0));
        }

        let risk_level = risk_level(&events);
        debug!("{}: {} events, risk {}", route.truck_id, events.len(), risk_level);
        RiskAssessment {
            route,
            risk_level,
            conflicts: events,
        }
    }
}

#[async_trait]
impl Agent for ConflictRiskAgent {
    fn id(&self) -> &str {
        "conflict_risk"
    }

    fn name(&self) -> &str {
        "Conflict Risk"
    }

    async fn process(&mut self, mut state: PipelineState) -> Result<PipelineState> {
        let routes: Vec<PlannedRoute> = state.get_as(keys::ROUTES)?.unwrap_or_default();
        let farms: BTreeMap<String, Coord> = state.get_as(keys::FARM_COORDS)?.unwrap_or_default();

        let mut assessments = Vec::with_capacity(routes.len());
        for route in routes {
            assessments.push(self.assess(route, &farms).await);
        }
        info!(
            "Assessed {} routes ({} elevated)",
            assessments.len(),
            assessments.iter().filter(|a| a.risk_level != RiskLevel::Low).count()
        );

        state.set(keys::RISK_ASSESSMENTS, &assessments)?;
        Ok(state)
    }
}
