use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::cost::{eta_hours, rest_stops, round_to, FuelCost};
use super::snap::{final_leg_km, RoadNetworks};
use super::solver::{self, Solution};
use crate::adapters::QueryService;
use crate::config::RoutingConfig;
use crate::domain::{RiskAssessment, Route};
use crate::error::{AgriflowError, Result};
use crate::reference;
use crate::spatial::{haversine_km, Coord, GeometryIndex};

/// Inputs for one routing solve
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'a> {
    pub country_iso: &'a str,
    pub start: Coord,
    pub end: Coord,
    pub farms: &'a BTreeMap<String, Coord>,
    pub payload_tonnes: f64,
    pub risk: &'a [RiskAssessment],
}

/// Great-circle distances in whole metres (truncated)
pub fn distance_matrix(coords: &[Coord]) -> Vec<Vec<i64>> {
    coords
        .iter()
        .map(|&p| coords.iter().map(|&q| (haversine_km(p, q) * 1000.0) as i64).collect())
        .collect()
}

/// Plans truck routes: solve, final leg, ETA/rest, risk merge, fuel cost
pub struct RoutingEngine {
    config: RoutingConfig,
    networks: RoadNetworks,
}

impl RoutingEngine {
    pub fn new(store: Arc<dyn QueryService>, config: RoutingConfig) -> Self {
        Self {
            config,
            networks: RoadNetworks::new(store),
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// One route per vehicle, or none when the solver finds no assignment
    pub async fn plan(&mut self, request: &RouteRequest<'_>) -> Vec<Route> {
        let customers: Vec<&String> = request.farms.keys().collect();
        let coords: Vec<Coord> = std::iter::once(request.start)
            .chain(request.farms.values().copied())
            .collect();
        let matrix = Arc::new(distance_matrix(&coords));

        let solution = match self.solve(Arc::clone(&matrix)).await {
            Ok(Some(solution)) => solution,
            Ok(None) => {
                warn!(
                    "No routing solution for {} farms within {} ms",
                    customers.len(),
                    self.config.search_time_limit_ms
                );
                return Vec::new();
            }
            Err(e) => {
                warn!("{}", e);
                return Vec::new();
            }
        };

        let risk_by_truck: HashMap<&str, &RiskAssessment> = request
            .risk
            .iter()
            .map(|ra| (ra.route.truck_id.as_str(), ra))
            .collect();
        let pump_price = reference::pump_price(request.country_iso, self.config.fuel)
            .unwrap_or(self.config.default_pump_price_usd);

        let index = self
            .networks
            .index_for(request.country_iso)
            .await
            .map(|i| i as &dyn GeometryIndex);

        let mut routes = Vec::with_capacity(solution.routes.len());
        for (v, nodes) in solution.routes.iter().enumerate() {
            let truck_id = format!("T{}", v + 1);
            let metres = solver::route_cost(&matrix, 0, nodes);

            let stops: Vec<String> = nodes
                .iter()
                .filter_map(|&node| node.checked_sub(1).and_then(|c| customers.get(c)))
                .map(|id| id.to_string())
                .collect();
            let last = stops
                .last()
                .and_then(|id| request.farms.get(id))
                .copied()
                .unwrap_or(request.start);

            let distance_km = metres as f64 / 1000.0;
            let final_km = final_leg_km(index, last, request.end);
            let total_km = distance_km + final_km;

            let assessment = risk_by_truck.get(truck_id.as_str());
            let rounded_total = round_to(total_km, 1);
            let fuel = FuelCost::compute(rounded_total, pump_price, request.payload_tonnes, &self.config);

            routes.push(Route {
                distance_km: round_to(distance_km, 1),
                final_leg_km: round_to(final_km, 1),
                total_km: rounded_total,
                eta_hours: round_to(eta_hours(total_km, self.config.average_speed_kmh), 2),
                rest_stops: rest_stops(total_km, self.config.rest_interval_km),
                risk_level: assessment.map(|a| a.risk_level).unwrap_or_default(),
                conflicts: assessment.map(|a| a.conflicts.clone()).unwrap_or_default(),
                risk_evaluated: assessment.is_some(),
                fuel_usd: fuel.fuel_usd,
                cost_per_tonne: fuel.cost_per_tonne,
                truck_id,
                stops,
            });
        }

        info!(
            "Planned {} routes for {} ({} farms, snapped={})",
            routes.len(),
            request.country_iso,
            customers.len(),
            index.is_some()
        );
        routes
    }

    /// `Ok(None)` when the budget ran out; `Err` when the solve could not run at all
    async fn solve(&self, matrix: Arc<Vec<Vec<i64>>>) -> Result<Option<Solution>> {
        let vehicles = self.config.fleet_size;
        if vehicles == 0 {
            return Err(AgriflowError::Solver("fleet_size is 0".to_string()));
        }
        let budget = Duration::from_millis(self.config.search_time_limit_ms);
        tokio::task::spawn_blocking(move || solver::solve(&matrix, vehicles, 0, budget))
            .await
            .map_err(|e| AgriflowError::Solver(format!("solver task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStore;
    use crate::domain::{PlannedRoute, RiskLevel};

    fn farms() -> BTreeMap<String, Coord> {
        let mut farms = BTreeMap::new();
        farms.insert("F1".to_string(), Coord::new(-24.2, 26.1));
        farms.insert("F2".to_string(), Coord::new(-24.9, 26.4));
        farms
    }

    fn engine() -> RoutingEngine {
        RoutingEngine::new(Arc::new(InMemoryStore::new()), RoutingConfig::default())
    }

    fn request<'a>(farms: &'a BTreeMap<String, Coord>, risk: &'a [RiskAssessment]) -> RouteRequest<'a> {
        RouteRequest {
            country_iso: "BWA",
            start: Coord::new(-24.65, 25.91),
            end: Coord::new(-25.90, 28.20),
            farms,
            payload_tonnes: 10.0,
            risk,
        }
    }

    #[tokio::test]
    async fn test_two_trucks_cover_every_farm() {
        let farms = farms();
        let routes = engine().plan(&request(&farms, &[])).await;

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].truck_id, "T1");
        assert_eq!(routes[1].truck_id, "T2");

        let mut stops: Vec<&String> = routes.iter().flat_map(|r| &r.stops).collect();
        stops.sort();
        assert_eq!(stops, vec!["F1", "F2"]);

        for r in &routes {
            assert!(r.total_km >= r.final_leg_km && r.final_leg_km >= 0.0);
            assert!(r.eta_hours >= 0.0);
            assert!(r.fuel_usd >= rust_decimal::Decimal::ZERO);
        }
    }

    #[tokio::test]
    async fn test_idle_truck_drives_start_to_end() {
        let mut one_farm = BTreeMap::new();
        one_farm.insert("F1".to_string(), Coord::new(-24.2, 26.1));
        let req = request(&one_farm, &[]);
        let routes = engine().plan(&req).await;

        let idle = routes.iter().find(|r| r.stops.is_empty()).unwrap();
        assert_eq!(idle.distance_km, 0.0);
        assert_eq!(idle.final_leg_km, round_to(haversine_km(req.start, req.end), 1));
    }

    #[tokio::test]
    async fn test_unmatched_risk_defaults_low() {
        let farms = farms();
        let risk = vec![RiskAssessment {
            route: PlannedRoute {
                truck_id: "T2".to_string(),
                stops: vec!["F2".to_string()],
            },
            risk_level: RiskLevel::High,
            conflicts: Vec::new(),
        }];
        let routes = engine().plan(&request(&farms, &risk)).await;

        let t1 = routes.iter().find(|r| r.truck_id == "T1").unwrap();
        assert_eq!(t1.risk_level, RiskLevel::Low);
        assert!(t1.conflicts.is_empty());
        assert!(!t1.risk_evaluated);

        let t2 = routes.iter().find(|r| r.truck_id == "T2").unwrap();
        assert_eq!(t2.risk_level, RiskLevel::High);
        assert!(t2.risk_evaluated);
    }

    #[tokio::test]
    async fn test_exhausted_budget_gives_no_routes() {
        let farms = farms();
        let config = RoutingConfig {
            search_time_limit_ms: 0,
            ..RoutingConfig::default()
        };
        let mut engine = RoutingEngine::new(Arc::new(InMemoryStore::new()), config);
        assert!(engine.plan(&request(&farms, &[])).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_fleet_is_a_solver_error() {
        let farms = farms();
        let config = RoutingConfig {
            fleet_size: 0,
            ..RoutingConfig::default()
        };
        let mut engine = RoutingEngine::new(Arc::new(InMemoryStore::new()), config);
        let matrix = Arc::new(distance_matrix(&[Coord::new(-24.65, 25.91), Coord::new(-24.2, 26.1)]));
        assert!(matches!(engine.solve(matrix).await, Err(AgriflowError::Solver(_))));
        assert!(engine.plan(&request(&farms, &[])).await.is_empty());
    }

    #[test]
    fn test_distance_matrix_symmetric_zero_diagonal() {
        let coords = [Coord::new(-24.65, 25.91), Coord::new(-24.2, 26.1), Coord::new(-24.9, 26.4)];
        let m = distance_matrix(&coords);
        for i in 0..3 {
            assert_eq!(m[i][i], 0);
            for j in 0..3 {
                assert_eq!(m[i][j], m[j][i]);
            }
        }
    }
}
