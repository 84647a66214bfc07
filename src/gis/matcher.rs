// src/gis/matcher.rs

use rusqlite::Connection;
use serde::Serialize;
use tracing::warn;

use crate::db::connection::Database;
use crate::db::zones::{list_zones, Zone};
use crate::domain::Tier;
use crate::gis::geometry::ZoneGeometry;

/// The innermost zone enclosing a point. Absence means "unzoned".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneMatch {
    pub tier: Tier,
    pub contour: i64,
}

#[derive(Debug, Clone)]
struct IndexedZone {
    tier: Tier,
    contour: i64,
    geometry: ZoneGeometry,
}

/// The active zone set, parsed once and matched against many points.
/// Loading a whole generation up front means one batch never mixes
/// results from two zone sets.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    zones: Vec<IndexedZone>,
}

impl ZoneIndex {
    /// Never fails: an unreadable store yields an empty index.
    pub fn load(conn: &Connection) -> Self {
        match list_zones(conn) {
            Ok(rows) => {
                let index = Self::from_zones(&rows);
                if index.is_empty() {
                    warn!("no usable zones loaded; every point will be unzoned");
                }
                index
            }
            Err(e) => {
                warn!(error = %e, "failed to load zones; every point will be unzoned");
                Self::default()
            }
        }
    }

    /// Rows whose geometry does not parse are skipped.
    pub fn from_zones(rows: &[Zone]) -> Self {
        let zones = rows
            .iter()
            .filter_map(|z| match ZoneGeometry::from_geojson(&z.geometry) {
                Ok(geometry) => Some(IndexedZone {
                    tier: z.tier,
                    contour: z.contour,
                    geometry,
                }),
                Err(e) => {
                    warn!(zone_id = z.id, error = %e, "skipping zone with malformed geometry");
                    None
                }
            })
            .collect();

        Self { zones }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Smallest contour among the zones containing the point.
    pub fn match_point(&self, lat: f64, lon: f64) -> Option<ZoneMatch> {
        self.zones
            .iter()
            .filter(|z| z.geometry.contains(lat, lon))
            .min_by_key(|z| (z.contour, z.tier))
            .map(|z| ZoneMatch {
                tier: z.tier,
                contour: z.contour,
            })
    }
}

/// One-off lookup against the current store. Failures degrade to unzoned.
pub fn match_zone(db: &Database, lat: f64, lon: f64) -> Option<ZoneMatch> {
    match db.with_conn(|conn| Ok(ZoneIndex::load(conn))) {
        Ok(index) => index.match_point(lat, lon),
        Err(e) => {
            warn!(lat, lon, error = %e, "zone lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gis::geometry::square;
    use chrono::Utc;
    use serde_json::{json, Value};

    fn zone(id: i64, tier: Tier, contour: i64, geometry: Value) -> Zone {
        Zone {
            id,
            tier,
            contour,
            geometry,
            created_at: Utc::now().naive_utc(),
        }
    }

    // Nested isochrones around (0, 0): 15 inside 30 inside 45.
    fn nested() -> ZoneIndex {
        ZoneIndex::from_zones(&[
            zone(1, Tier::Bronze, 45, square(-3.0, -3.0, 6.0)),
            zone(2, Tier::Gold, 15, square(-1.0, -1.0, 2.0)),
            zone(3, Tier::Silver, 30, square(-2.0, -2.0, 4.0)),
        ])
    }

    #[test]
    fn innermost_zone_wins() {
        let index = nested();
        assert_eq!(index.match_point(0.0, 0.0), Some(ZoneMatch { tier: Tier::Gold, contour: 15 }));
        assert_eq!(index.match_point(1.5, 1.5), Some(ZoneMatch { tier: Tier::Silver, contour: 30 }));
        assert_eq!(index.match_point(2.5, -2.5), Some(ZoneMatch { tier: Tier::Bronze, contour: 45 }));
    }

    #[test]
    fn outside_every_zone_is_unzoned() {
        assert_eq!(nested().match_point(10.0, 10.0), None);
    }

    #[test]
    fn empty_index_is_unzoned() {
        let index = ZoneIndex::default();
        assert!(index.is_empty());
        assert_eq!(index.match_point(0.0, 0.0), None);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let index = ZoneIndex::from_zones(&[
            zone(1, Tier::Gold, 15, json!({ "type": "Polygon", "coordinates": "nope" })),
            zone(2, Tier::Silver, 30, Value::Null),
            zone(3, Tier::Bronze, 45, square(-1.0, -1.0, 2.0)),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.match_point(0.0, 0.0).map(|m| m.contour), Some(45));
    }

    #[test]
    fn same_contour_overlap_gives_that_contour() {
        let index = ZoneIndex::from_zones(&[
            zone(1, Tier::Silver, 30, square(-1.0, -1.0, 2.0)),
            zone(2, Tier::Silver, 30, square(-0.5, -0.5, 2.0)),
        ]);
        assert_eq!(index.match_point(0.0, 0.0), Some(ZoneMatch { tier: Tier::Silver, contour: 30 }));
    }
}
