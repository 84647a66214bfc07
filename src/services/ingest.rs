use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::change_log::insert_change_log;
use crate::db::connection::Database;
use crate::db::listings::{find_by_external_id, insert_listing, update_tracked_fields};
use crate::domain::{track_changes, ChangeOutcome, ChangeSet, NormalizedListing, TrackedFields};
use crate::errors::{AppError, Result};
use crate::gis::ZoneIndex;
use crate::scraper::{ListingSource, RawListing};

/// Aggregate counters reported for an ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub new: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed_locations: usize,
}

impl IngestSummary {
    fn absorb(&mut self, other: IngestSummary) {
        self.new += other.new;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed_locations += other.failed_locations;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Inserted { id: i64 },
    /// Re-sighting. `changes` is `None` when nothing tracked differed.
    Updated { id: i64, changes: Option<ChangeSet> },
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted { .. })
    }
}

/// Upserts one normalized record keyed by `external_id`.
///
/// On re-sighting the tracked fields are diffed against the stored row; a
/// non-empty diff writes one change-log entry and the new values. The caller
/// owns the transaction so the listing and its log entry commit together.
pub fn upsert_listing(
    conn: &Connection,
    listing: &NormalizedListing,
    listing_type: &str,
    zones: &ZoneIndex,
    now: NaiveDateTime,
) -> Result<UpsertOutcome> {
    let zone = zones.match_point(listing.latitude, listing.longitude);

    let incoming = TrackedFields {
        price: listing.price,
        status: listing.status.clone(),
        beds: listing.beds,
        baths: listing.baths,
        sqft: listing.sqft,
        price_tier: listing.price_tier,
        gis_tier: zone.map(|z| z.tier),
        gis_contour: zone.map(|z| z.contour),
    };

    let Some(stored) = find_by_external_id(conn, &listing.external_id)? else {
        let id = insert_listing(conn, listing, listing_type, zone, now)?;
        return Ok(UpsertOutcome::Inserted { id });
    };

    match track_changes(Some(&stored.fields), &incoming) {
        ChangeOutcome::Changed(changes) => {
            insert_change_log(conn, stored.id, &changes, now)?;
            update_tracked_fields(conn, stored.id, &incoming)?;
            Ok(UpsertOutcome::Updated {
                id: stored.id,
                changes: Some(changes),
            })
        }
        // Unchanged rows are not rewritten.
        ChangeOutcome::NoOp | ChangeOutcome::Insert => Ok(UpsertOutcome::Updated {
            id: stored.id,
            changes: None,
        }),
    }
}

/// Ingests one batch of raw records in a single transaction.
///
/// Each record runs inside its own savepoint: a record that fails
/// normalization or storage is skipped and rolled back alone, while the rest
/// of the batch commits together at the end.
pub fn ingest_records(
    conn: &mut Connection,
    records: &[RawListing],
    listing_type: &str,
    zones: &ZoneIndex,
) -> Result<IngestSummary> {
    let now = Utc::now().naive_utc();
    let mut summary = IngestSummary::default();
    let mut tx = conn.transaction()?;

    for raw in records {
        let listing = match NormalizedListing::from_raw(raw) {
            Ok(listing) => listing,
            Err(reason) => {
                warn!(url = ?raw.property_url, %reason, "skipping record");
                summary.skipped += 1;
                continue;
            }
        };

        let sp = tx.savepoint()?;
        match upsert_listing(&sp, &listing, listing_type, zones, now) {
            Ok(outcome) => {
                sp.commit()?;
                if outcome.is_new() {
                    summary.new += 1;
                } else {
                    summary.updated += 1;
                }
            }
            Err(e) => {
                // Dropping the savepoint rolls back this record only.
                warn!(external_id = %listing.external_id, error = %e, "upsert failed, skipping record");
                summary.skipped += 1;
            }
        }
    }

    tx.commit()?;
    Ok(summary)
}

/// Convenience wrapper: loads the current zone generation and ingests.
pub fn ingest_batch(db: &Database, records: &[RawListing], listing_type: &str) -> Result<IngestSummary> {
    db.with_conn(|conn| {
        let zones = ZoneIndex::load(conn);
        ingest_records(conn, records, listing_type, &zones)
    })
}

/// Runs ingestion over every location, committing once per location.
/// A location whose fetch or commit fails is logged and skipped.
pub fn ingest(
    db: &Database,
    source: &dyn ListingSource,
    locations: &[String],
    listing_types: &[String],
) -> Result<IngestSummary> {
    let listing_type = listing_types.join(",");
    let mut total = IngestSummary::default();

    info!(locations = locations.len(), %listing_type, "starting ingestion");

    for location in locations {
        let records = match source.fetch(location, listing_types) {
            Ok(records) => records,
            Err(e) => {
                error!(%location, error = %e, "listing source failed");
                total.failed_locations += 1;
                continue;
            }
        };

        if records.is_empty() {
            info!(%location, "no listings found");
            continue;
        }

        match ingest_batch(db, &records, &listing_type) {
            Ok(summary) => {
                info!(
                    %location,
                    new = summary.new,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "location ingested"
                );
                total.absorb(summary);
            }
            Err(e) => {
                error!(%location, error = %e, "location batch failed to commit");
                total.failed_locations += 1;
            }
        }
    }

    info!(
        new = total.new,
        updated = total.updated,
        skipped = total.skipped,
        failed_locations = total.failed_locations,
        "ingestion complete"
    );

    if !locations.is_empty() && total.failed_locations == locations.len() {
        return Err(AppError::Internal(format!(
            "all {} locations failed",
            locations.len()
        )));
    }
    Ok(total)
}
