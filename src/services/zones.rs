use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::db::connection::Database;
use crate::db::listings::{listing_points, update_gis};
use crate::db::zones::replace_zones;
use crate::errors::{AppError, Result};
use crate::gis::features::tagged_features;
use crate::gis::tiering::{assign_by_rank, assign_by_threshold, rank_durations};
use crate::gis::{IsochroneProvider, LatLon, NewZone, TierThresholds, ZoneIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneReplacement {
    /// Zones in the new active set.
    pub inserted: usize,
    /// Listings whose zone fields changed in the follow-up backfill.
    pub backfilled: usize,
}

/// Requests isochrones around `center` and replaces the zone set with the
/// tiered result. Provider failure or an empty result leaves the current
/// set untouched.
pub fn regenerate_zones(
    db: &Database,
    provider: &dyn IsochroneProvider,
    center: LatLon,
    durations: &[u32],
    costing: &str,
) -> Result<ZoneReplacement> {
    let ranked: Vec<u32> = rank_durations(durations).into_iter().map(|(d, _)| d).collect();
    if ranked.is_empty() {
        return Err(AppError::InvalidInput("at least one positive duration is required".into()));
    }
    if ranked.len() < durations.len() {
        debug!(?durations, ?ranked, "only the three shortest distinct durations are tiered");
    }

    info!(lat = center.lat, lon = center.lon, ?ranked, costing, "regenerating zones");
    let features = provider.fetch(center, costing, &ranked)?;
    let zones = assign_by_rank(&ranked, &features);

    replace_and_backfill(db, &zones)
}

/// Seeds the zone set from a GeoJSON-like document, tiering every feature
/// by its own contour against `thresholds`.
pub fn seed_zones(db: &Database, doc: &Value, thresholds: &TierThresholds) -> Result<ZoneReplacement> {
    let features = tagged_features(doc);
    let zones = assign_by_threshold(&features, thresholds);
    info!(features = features.len(), zones = zones.len(), "seeding zones");

    replace_and_backfill(db, &zones)
}

fn replace_and_backfill(db: &Database, zones: &[NewZone]) -> Result<ZoneReplacement> {
    if zones.is_empty() {
        warn!("no valid zones produced; keeping the current zone set");
        return Err(AppError::EmptyZoneSet);
    }

    let inserted = db.with_conn(|conn| replace_zones(conn, zones))?;
    let backfilled = backfill(db)?;

    Ok(ZoneReplacement {
        inserted,
        backfilled,
    })
}

/// Recomputes the zone match of every listing that has a point and writes
/// back only the ones that moved. Returns the number of listings updated.
pub fn backfill(db: &Database) -> Result<usize> {
    db.with_conn(|conn| {
        let tx = conn.transaction()?;
        let zones = ZoneIndex::load(&tx);
        let points = listing_points(&tx)?;
        info!(listings = points.len(), zones = zones.len(), "starting zone backfill");

        let mut updated = 0;
        for point in &points {
            let matched = zones.match_point(point.latitude, point.longitude);
            let tier = matched.map(|m| m.tier);
            let contour = matched.map(|m| m.contour);

            if tier != point.gis_tier || contour != point.gis_contour {
                debug!(
                    listing_id = point.id,
                    old_tier = ?point.gis_tier,
                    new_tier = ?tier,
                    old_contour = ?point.gis_contour,
                    new_contour = ?contour,
                    "zone changed"
                );
                update_gis(&tx, point.id, matched)?;
                updated += 1;
            }
        }

        tx.commit()?;
        info!(updated, "backfill complete");
        Ok(updated)
    })
}
