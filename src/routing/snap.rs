//! Final-leg distance with road snapping.
//!
//! Road indices are loaded lazily per country and cached, including failed
//! loads, so one run never retries a country whose network could not be read.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::QueryService;
use crate::spatial::{haversine_km, snap_to_line, Coord, GeometryIndex, RoadIndex};

/// Per-country road index cache backed by the query service
pub struct RoadNetworks {
    store: Arc<dyn QueryService>,
    cache: HashMap<String, Option<RoadIndex>>,
}

impl RoadNetworks {
    pub fn new(store: Arc<dyn QueryService>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
        }
    }

    /// Road index for the country, or None when it has no usable network
    pub async fn index_for(&mut self, country_iso: &str) -> Option<&RoadIndex> {
        if !self.cache.contains_key(country_iso) {
            let loaded = self.load(country_iso).await;
            self.cache.insert(country_iso.to_string(), loaded);
        }
        self.cache.get(country_iso).and_then(Option::as_ref)
    }

    /// Whether a load (successful or not) has been attempted for the country
    pub fn is_cached(&self, country_iso: &str) -> bool {
        self.cache.contains_key(country_iso)
    }

    async fn load(&self, country_iso: &str) -> Option<RoadIndex> {
        let rows = match self.store.road_segments(country_iso).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Road network for {} unavailable, using straight lines: {}", country_iso, e);
                return None;
            }
        };
        if rows.is_empty() {
            info!("No road segments for {}", country_iso);
            return None;
        }
        match RoadIndex::from_rows(&rows) {
            Ok(index) => {
                info!("Loaded {} road segments for {}", index.len(), country_iso);
                Some(index)
            }
            Err(e) => {
                warn!("Road network for {} could not be parsed: {}", country_iso, e);
                None
            }
        }
    }
}

/// Distance from `from` to `to`, measured from the nearest road point to
/// `from` when an index can provide one; otherwise the straight line.
pub fn final_leg_km(index: Option<&dyn GeometryIndex>, from: Coord, to: Coord) -> f64 {
    let Some(index) = index else {
        return haversine_km(from, to);
    };

    match index.nearest(from) {
        Ok(Some(geometry)) => match snap_to_line(geometry, from) {
            Some(snapped) => {
                debug!("Snapped {} to road at {}", from, snapped);
                haversine_km(snapped, to)
            }
            None => {
                debug!("Nearest geometry to {} is not a line", from);
                haversine_km(from, to)
            }
        },
        Ok(None) => haversine_km(from, to),
        Err(e) => {
            warn!("Road lookup near {} failed, using straight line: {}", from, e);
            haversine_km(from, to)
        }
    }
}
