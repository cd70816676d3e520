//! Route planning: VRP solve over farms, road-snapped final leg, ETA,
//! rest stops, risk merge and fuel cost.

pub mod cost;
pub mod engine;
pub mod snap;
pub mod solver;

pub use cost::{eta_hours, rest_stops, FuelCost};
pub use engine::{distance_matrix, RouteRequest, RoutingEngine};
pub use snap::{final_leg_km, RoadNetworks};
pub use solver::{solve, Solution};
