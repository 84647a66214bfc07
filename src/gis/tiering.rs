// src/gis/tiering.rs

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::Tier;
use crate::gis::features::TaggedFeature;
use crate::gis::geometry::ZoneGeometry;

/// Inclusive upper contour bounds (minutes) for threshold seeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub gold: i64,
    pub silver: i64,
    pub bronze: i64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            gold: 40,
            silver: 60,
            bronze: 75,
        }
    }
}

impl TierThresholds {
    pub fn tier_for(&self, contour: i64) -> Option<Tier> {
        if contour <= self.gold {
            Some(Tier::Gold)
        } else if contour <= self.silver {
            Some(Tier::Silver)
        } else if contour <= self.bronze {
            Some(Tier::Bronze)
        } else {
            None
        }
    }
}

/// A fully tiered zone, ready for bulk replacement.
#[derive(Debug, Clone, PartialEq)]
pub struct NewZone {
    pub tier: Tier,
    pub contour: i64,
    pub geometry: Value,
}

/// Distinct positive durations, ascending, paired with tiers by rank.
/// Anything past the third duration gets no tier.
pub fn rank_durations(durations: &[u32]) -> Vec<(u32, Tier)> {
    let mut sorted: Vec<u32> = durations.iter().copied().filter(|d| *d > 0).collect();
    sorted.sort_unstable();
    sorted.dedup();

    sorted.into_iter().zip(Tier::RANKED).collect()
}

/// "generate" mode: tier provider features by the rank of their duration
/// among the caller's requested durations. A feature whose duration is not
/// exactly one of the ranked durations is dropped.
pub fn assign_by_rank(durations: &[u32], features: &[TaggedFeature]) -> Vec<NewZone> {
    let ranked = rank_durations(durations);

    features
        .iter()
        .filter_map(|feature| {
            let contour = feature.contour?;
            let Some(&(minutes, tier)) = ranked.iter().find(|(d, _)| f64::from(*d) == contour) else {
                debug!(contour, "dropping feature with unranked duration");
                return None;
            };
            checked_zone(tier, i64::from(minutes), &feature.geometry)
        })
        .collect()
}

/// "threshold seed" mode: each feature's own contour decides its tier.
/// Fractional contours are truncated toward zero.
pub fn assign_by_threshold(features: &[TaggedFeature], thresholds: &TierThresholds) -> Vec<NewZone> {
    features
        .iter()
        .filter_map(|feature| {
            let contour = feature.contour?.trunc() as i64;
            if contour <= 0 {
                warn!(contour, "discarding feature with non-positive contour");
                return None;
            }
            let Some(tier) = thresholds.tier_for(contour) else {
                debug!(contour, "contour beyond bronze threshold, discarded");
                return None;
            };
            checked_zone(tier, contour, &feature.geometry)
        })
        .collect()
}

fn checked_zone(tier: Tier, contour: i64, geometry: &Value) -> Option<NewZone> {
    match ZoneGeometry::from_geojson(geometry) {
        Ok(_) => Some(NewZone {
            tier,
            contour,
            geometry: geometry.clone(),
        }),
        Err(e) => {
            warn!(contour, error = %e, "skipping feature with unparseable geometry");
            None
        }
    }
}
