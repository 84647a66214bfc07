use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::domain::Tier;
use crate::errors::{AppError, Result};
use crate::gis::features::{feature, feature_collection};
use crate::gis::NewZone;

/// A zone row of the active set.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: i64,
    pub tier: Tier,
    pub contour: i64,
    /// GeoJSON geometry; `Null` if the stored text is not valid JSON.
    pub geometry: Value,
    pub created_at: NaiveDateTime,
}

pub fn list_zones(conn: &Connection) -> Result<Vec<Zone>> {
    let mut stmt = conn.prepare(
        "SELECT id, tier, contour, geometry, created_at FROM zones ORDER BY contour ASC, id ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(0)?;
        let raw_geometry: String = row.get(3)?;
        let geometry = serde_json::from_str(&raw_geometry).unwrap_or_else(|e| {
            warn!(zone_id = id, error = %e, "stored zone geometry is not valid JSON");
            Value::Null
        });

        Ok(Zone {
            id,
            tier: row.get(1)?,
            contour: row.get(2)?,
            geometry,
            created_at: row.get(4)?,
        })
    })?;

    let mut zones = Vec::new();
    for r in rows {
        zones.push(r?);
    }
    Ok(zones)
}

pub fn count_zones(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM zones", [], |r| r.get(0))?)
}

/// Replaces the whole zone set in one transaction: readers see either the
/// old generation or the new one. An empty set is refused before any write.
pub fn replace_zones(conn: &mut Connection, zones: &[NewZone]) -> Result<usize> {
    if zones.is_empty() {
        return Err(AppError::EmptyZoneSet);
    }

    let now = Utc::now().naive_utc();
    let tx = conn.transaction()?;

    let removed = tx.execute("DELETE FROM zones", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO zones (tier, contour, geometry, created_at) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for zone in zones {
            let geometry = serde_json::to_string(&zone.geometry)?;
            stmt.execute(params![zone.tier, zone.contour, geometry, now])?;
        }
    }

    tx.commit()?;
    info!(removed, inserted = zones.len(), "zone set replaced");
    Ok(zones.len())
}

/// The active set as a GeoJSON FeatureCollection tagged by tier/contour.
pub fn zones_feature_collection(conn: &Connection) -> Result<Value> {
    let features = list_zones(conn)?
        .into_iter()
        .map(|z| {
            feature(
                z.geometry,
                json!({ "id": z.id, "tier": z.tier, "contour": z.contour }),
            )
        })
        .collect();
    Ok(feature_collection(features))
}
