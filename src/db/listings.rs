use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::{NormalizedListing, PropertyListing, Tier, TrackedFields};
use crate::errors::Result;
use crate::gis::ZoneMatch;

/// The stored state of a listing, as needed by the change tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedListing {
    pub id: i64,
    pub fields: TrackedFields,
}

/// Geographic point plus the zone fields backfill may rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPoint {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub gis_tier: Option<Tier>,
    pub gis_contour: Option<i64>,
}

const LISTING_COLUMNS: &str = r#"
    l.id, l.external_id, l.address, l.price, l.status, l.listing_type,
    l.beds, l.baths, l.sqft, l.year_built, l.property_url, l.mls,
    l.price_tier, l.gis_tier, l.gis_contour, l.latitude, l.longitude, l.created_at
"#;

fn listing_from_row(row: &Row<'_>, latest_change: Option<NaiveDateTime>) -> rusqlite::Result<PropertyListing> {
    Ok(PropertyListing {
        id: row.get(0)?,
        external_id: row.get(1)?,
        address: row.get(2)?,
        price: row.get(3)?,
        status: row.get(4)?,
        listing_type: row.get(5)?,
        beds: row.get(6)?,
        baths: row.get(7)?,
        sqft: row.get(8)?,
        year_built: row.get(9)?,
        property_url: row.get(10)?,
        mls: row.get(11)?,
        price_tier: row.get(12)?,
        gis_tier: row.get(13)?,
        gis_contour: row.get(14)?,
        latitude: row.get(15)?,
        longitude: row.get(16)?,
        created_at: row.get(17)?,
        latest_change,
    })
}

/// Looks up a listing by its dedupe key.
pub fn find_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<TrackedListing>> {
    let found = conn
        .query_row(
            r#"
            SELECT id, price, status, beds, baths, sqft, price_tier, gis_tier, gis_contour
            FROM property_listings
            WHERE external_id = ?1
            "#,
            params![external_id],
            |row| {
                Ok(TrackedListing {
                    id: row.get(0)?,
                    fields: TrackedFields {
                        price: row.get(1)?,
                        status: row.get(2)?,
                        beds: row.get(3)?,
                        baths: row.get(4)?,
                        sqft: row.get(5)?,
                        price_tier: row.get(6)?,
                        gis_tier: row.get(7)?,
                        gis_contour: row.get(8)?,
                    },
                })
            },
        )
        .optional()?;
    Ok(found)
}

/// Inserts a first-sighting listing. The point is written here and never again.
pub fn insert_listing(
    conn: &Connection,
    listing: &NormalizedListing,
    listing_type: &str,
    zone: Option<ZoneMatch>,
    now: NaiveDateTime,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO property_listings (
            external_id, address, price, status, listing_type,
            beds, baths, sqft, year_built, property_url, mls,
            price_tier, gis_tier, gis_contour, latitude, longitude, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        "#,
        params![
            &listing.external_id,
            &listing.address,
            listing.price,
            &listing.status,
            listing_type,
            listing.beds,
            listing.baths,
            listing.sqft,
            listing.year_built,
            &listing.property_url,
            &listing.mls,
            listing.price_tier,
            zone.map(|z| z.tier),
            zone.map(|z| z.contour),
            listing.latitude,
            listing.longitude,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Writes the tracked fields of an existing listing.
pub fn update_tracked_fields(conn: &Connection, id: i64, fields: &TrackedFields) -> Result<()> {
    conn.execute(
        r#"
        UPDATE property_listings SET
            price = ?1, status = ?2, beds = ?3, baths = ?4, sqft = ?5,
            price_tier = ?6, gis_tier = ?7, gis_contour = ?8
        WHERE id = ?9
        "#,
        params![
            fields.price,
            &fields.status,
            fields.beds,
            fields.baths,
            fields.sqft,
            fields.price_tier,
            fields.gis_tier,
            fields.gis_contour,
            id,
        ],
    )?;
    Ok(())
}

pub fn update_gis(conn: &Connection, id: i64, zone: Option<ZoneMatch>) -> Result<()> {
    conn.execute(
        "UPDATE property_listings SET gis_tier = ?1, gis_contour = ?2 WHERE id = ?3",
        params![zone.map(|z| z.tier), zone.map(|z| z.contour), id],
    )?;
    Ok(())
}

/// Every listing that has a geographic point.
pub fn listing_points(conn: &Connection) -> Result<Vec<ListingPoint>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, latitude, longitude, gis_tier, gis_contour
        FROM property_listings
        WHERE latitude IS NOT NULL AND longitude IS NOT NULL
        ORDER BY id
        "#,
    )?;

    let rows = stmt.query_map([], |row| {
        Ok(ListingPoint {
            id: row.get(0)?,
            latitude: row.get(1)?,
            longitude: row.get(2)?,
            gis_tier: row.get(3)?,
            gis_contour: row.get(4)?,
        })
    })?;

    let mut points = Vec::new();
    for r in rows {
        points.push(r?);
    }
    Ok(points)
}

pub fn get_listing(conn: &Connection, id: i64) -> Result<Option<PropertyListing>> {
    let sql = format!("SELECT {LISTING_COLUMNS} FROM property_listings l WHERE l.id = ?1");
    let found = conn
        .query_row(&sql, params![id], |row| listing_from_row(row, None))
        .optional()?;
    Ok(found)
}

pub fn find_listing_by_external_id(conn: &Connection, external_id: &str) -> Result<Option<PropertyListing>> {
    let sql = format!("SELECT {LISTING_COLUMNS} FROM property_listings l WHERE l.external_id = ?1");
    let found = conn
        .query_row(&sql, params![external_id], |row| listing_from_row(row, None))
        .optional()?;
    Ok(found)
}

/// All listings, each with the timestamp of its newest change-log entry.
pub fn list_listings(conn: &Connection) -> Result<Vec<PropertyListing>> {
    let sql = format!(
        r#"
        SELECT {LISTING_COLUMNS}, h.latest
        FROM property_listings l
        LEFT JOIN (
            SELECT property_id, MAX(timestamp) AS latest
            FROM property_change_log
            GROUP BY property_id
        ) h ON h.property_id = l.id
        ORDER BY l.id
        "#
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        let latest: Option<NaiveDateTime> = row.get(18)?;
        listing_from_row(row, latest)
    })?;

    let mut listings = Vec::new();
    for r in rows {
        listings.push(r?);
    }
    Ok(listings)
}

pub fn count_listings(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM property_listings", [], |r| r.get(0))?)
}
