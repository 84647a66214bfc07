// src/domain/listing.rs

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::tier::{price_tier, Tier};
use crate::scraper::RawListing;

/// A raw source record, cleaned and validated, ready for upsert.
/// This acts as an anti-corruption layer between the source and our tables.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedListing {
    pub external_id: String,
    pub address: String,
    pub price: Option<f64>,
    pub status: String,
    pub beds: Option<i64>,
    pub baths: Option<f64>,
    pub sqft: Option<i64>,
    pub year_built: Option<i64>,
    pub mls: Option<String>,
    pub property_url: String,
    pub latitude: f64,
    pub longitude: f64,
    pub price_tier: Option<Tier>,
}

impl NormalizedListing {
    /// Rejects records without an external id or a usable point.
    pub fn from_raw(raw: &RawListing) -> Result<Self, String> {
        let external_id = raw
            .property_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or("Missing or empty property url")?
            .to_string();

        let latitude = raw
            .latitude
            .filter(|v| v.is_finite() && (-90.0..=90.0).contains(v))
            .ok_or("Missing or invalid latitude")?;
        let longitude = raw
            .longitude
            .filter(|v| v.is_finite() && (-180.0..=180.0).contains(v))
            .ok_or("Missing or invalid longitude")?;

        let price = raw.list_price.filter(|p| p.is_finite());

        let address = match raw.formatted_address.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => a.to_string(),
            _ => format!(
                "{}, {}, {}",
                raw.street.as_deref().unwrap_or(""),
                raw.city.as_deref().unwrap_or(""),
                raw.state.as_deref().unwrap_or("")
            ),
        };

        Ok(NormalizedListing {
            property_url: external_id.clone(),
            external_id,
            address,
            price,
            status: raw
                .status
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown")
                .to_string(),
            beds: raw.beds,
            baths: raw.full_baths.filter(|b| b.is_finite()),
            sqft: raw.sqft,
            year_built: raw.year_built,
            mls: raw.mls.clone().filter(|m| !m.is_empty()),
            latitude,
            longitude,
            price_tier: price_tier(price),
        })
    }
}

/// A listing row as stored in `property_listings`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyListing {
    pub id: i64,
    pub external_id: String,
    pub address: String,
    pub price: Option<f64>,
    pub status: String,
    pub listing_type: String,
    pub beds: Option<i64>,
    pub baths: Option<f64>,
    pub sqft: Option<i64>,
    pub year_built: Option<i64>,
    pub property_url: Option<String>,
    pub mls: Option<String>,
    pub price_tier: Option<Tier>,
    pub gis_tier: Option<Tier>,
    pub gis_contour: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: NaiveDateTime,
    /// Timestamp of the newest change-log entry, when listed with history.
    pub latest_change: Option<NaiveDateTime>,
}
