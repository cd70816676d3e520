//! Road-network index
//!
//! R-tree over road segment geometries (WKT or GeoJSON text, lon/lat order).
//! The routing engine only needs two things from it: the nearest geometry to
//! a point, and whether that geometry is a line a point can be projected on.

use geo::{
    BoundingRect, Closest, ClosestPoint, Geometry, LineInterpolatePoint, LineLocatePoint,
    LineString, Point,
};
use geojson::GeoJson;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use tracing::debug;
use wkt::TryFromWkt;

use super::Coord;
use crate::error::{AgriflowError, Result};

/// Nearest-geometry lookup over a reference geometry set
pub trait GeometryIndex: Send + Sync {
    /// Geometry closest to `point`, or None when the index has nothing to offer
    fn nearest(&self, point: Coord) -> Result<Option<&Geometry<f64>>>;
}

/// One indexed road geometry
#[derive(Debug, Clone)]
pub struct RoadSegment {
    pub id: usize,
    pub geometry: Geometry<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RoadSegment {
    /// Returns None for empty geometries (no bounding box to index)
    pub fn new(id: usize, geometry: Geometry<f64>) -> Option<Self> {
        let rect = geometry.bounding_rect()?;
        let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        Some(Self {
            id,
            geometry,
            envelope,
        })
    }
}

impl RTreeObject for RoadSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Squared planar distance from `query` to the closest point of `geometry`
fn closest_distance_2<G: ClosestPoint<f64>>(geometry: &G, query: Point<f64>) -> f64 {
    match geometry.closest_point(&query) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => {
            let dx = p.x() - query.x();
            let dy = p.y() - query.y();
            dx * dx + dy * dy
        }
        Closest::Indeterminate => f64::MAX,
    }
}

impl PointDistance for RoadSegment {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        closest_distance_2(&self.geometry, Point::new(point[0], point[1]))
    }
}

/// R-tree backed road index for one country
#[derive(Debug)]
pub struct RoadIndex {
    tree: RTree<RoadSegment>,
}

impl RoadIndex {
    /// Bulk-load geometries into the R-tree (much faster than individual inserts)
    pub fn from_geometries(geometries: Vec<Geometry<f64>>) -> Self {
        let segments: Vec<RoadSegment> = geometries
            .into_iter()
            .enumerate()
            .filter_map(|(id, g)| RoadSegment::new(id, g))
            .collect();
        Self {
            tree: RTree::bulk_load(segments),
        }
    }

    /// Parse WKT rows or GeoJSON geometry/feature documents. Any unparsable row fails the whole load.
    pub fn from_rows<I, S>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let geometries = rows
            .into_iter()
            .map(|row| parse_geometry(row.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        debug!("Parsed {} road geometries", geometries.len());
        Ok(Self::from_geometries(geometries))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl GeometryIndex for RoadIndex {
    fn nearest(&self, point: Coord) -> Result<Option<&Geometry<f64>>> {
        Ok(self
            .tree
            .nearest_neighbor(&[point.lon, point.lat])
            .map(|segment| &segment.geometry))
    }
}

fn parse_geometry(text: &str) -> Result<Geometry<f64>> {
    let text = text.trim();
    if !text.starts_with('{') {
        return Geometry::<f64>::try_from_wkt_str(text)
            .map_err(|e| AgriflowError::Validation(format!("bad road WKT: {e}")));
    }
    let geometry = match text.parse::<GeoJson>()? {
        GeoJson::Geometry(g) => g,
        GeoJson::Feature(f) => f.geometry.ok_or_else(|| {
            AgriflowError::Validation("road feature has no geometry".to_string())
        })?,
        GeoJson::FeatureCollection(_) => {
            return Err(AgriflowError::Validation(
                "expected one road geometry per row, got a FeatureCollection".to_string(),
            ))
        }
    };
    Ok(Geometry::<f64>::try_from(geometry)?)
}

/// Project `point` onto `geometry` and return the snapped position.
///
/// Only line geometries support projection; anything else yields None.
/// A multi-line road snaps onto whichever member line is closest.
pub fn snap_to_line(geometry: &Geometry<f64>, point: Coord) -> Option<Coord> {
    let query = point.to_point();
    let line = match geometry {
        Geometry::LineString(ls) => ls.clone(),
        Geometry::Line(l) => LineString::new(vec![l.start, l.end]),
        Geometry::MultiLineString(mls) => mls
            .0
            .iter()
            .filter(|ls| ls.0.len() >= 2)
            .min_by(|a, b| {
                closest_distance_2(*a, query).total_cmp(&closest_distance_2(*b, query))
            })?
            .clone(),
        _ => return None,
    };
    let fraction = line.line_locate_point(&query)?;
    line.line_interpolate_point(fraction).map(Coord::from_point)
}
