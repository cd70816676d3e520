//! Geo utilities: great-circle distance and road-network snapping.

pub mod road;

use serde::{Deserialize, Serialize};

pub use road::{snap_to_line, GeometryIndex, RoadIndex, RoadSegment};

/// Mean Earth radius used for great-circle distances (km)
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate. Serialized as a `[lat, lon]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Planar point in (x = lon, y = lat) order, as road geometries are stored
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }

    pub fn from_point(p: geo::Point<f64>) -> Self {
        Self::new(p.y(), p.x())
    }
}

impl From<(f64, f64)> for Coord {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self::new(lat, lon)
    }
}

impl From<Coord> for (f64, f64) {
    fn from(c: Coord) -> Self {
        (c.lat, c.lon)
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.4}, {:.4})", self.lat, self.lon)
    }
}

/// Great-circle (haversine) distance in km
pub fn haversine_km(p: Coord, q: Coord) -> f64 {
    let dlat = (q.lat - p.lat).to_radians();
    let dlon = (q.lon - p.lon).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + p.lat.to_radians().cos() * q.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}
