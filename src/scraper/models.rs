use serde::{Deserialize, Serialize};

/// Flat record as produced by any listing source. This is the only shape
/// the ingestion engine consumes; source-specific payloads are mapped into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawListing {
    /// Canonical listing URL; doubles as the dedupe key.
    pub property_url: Option<String>,
    pub mls: Option<String>,
    pub formatted_address: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub list_price: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub beds: Option<i64>,
    pub full_baths: Option<f64>,
    pub sqft: Option<i64>,
    pub year_built: Option<i64>,
    pub status: Option<String>,
}

// Realtor search-page payload (subset of __NEXT_DATA__):
//
// prop
//  ├── permalink
//  ├── source
//  │    ├── name
//  │    ├── id
//  │    └── listing_id
//  ├── location
//  │    ├── address
//  │    │    ├── line, city, state_code, postal_code
//  │    │    └── coordinate { lat, lon }
//  │    └── coordinate { lat, lon }   (older payloads)
//  └── description
//       ├── beds, baths, baths_full
//       ├── sqft, year_built
//       └── type

#[derive(Debug, Deserialize)]
pub struct Property {
    pub permalink: Option<String>,
    pub source: Option<Source>,
    pub location: Option<Location>,
    pub description: Option<Description>,

    pub status: Option<String>,
    pub list_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Source {
    pub listing_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    pub address: Option<Address>,
    pub coordinate: Option<Coordinate>,
}

#[derive(Debug, Deserialize)]
pub struct Address {
    pub line: Option<String>,
    pub city: Option<String>,
    pub state_code: Option<String>,
    pub postal_code: Option<String>,
    pub coordinate: Option<Coordinate>,
}

#[derive(Debug, Deserialize)]
pub struct Coordinate {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Description {
    pub beds: Option<i64>,
    pub baths: Option<f64>,
    pub baths_full: Option<f64>,
    pub sqft: Option<i64>,
    pub year_built: Option<i64>,
}

pub const REALTOR_DETAIL_BASE: &str = "https://www.realtor.com/realestateandhomes-detail/";

impl Property {
    /// Flattens the nested realtor payload into a [`RawListing`].
    /// Missing pieces stay `None`; validation happens during normalization.
    pub fn into_raw_listing(self) -> RawListing {
        let address = self.location.as_ref().and_then(|l| l.address.as_ref());
        let coordinate = address
            .and_then(|a| a.coordinate.as_ref())
            .or_else(|| self.location.as_ref().and_then(|l| l.coordinate.as_ref()));
        let description = self.description.as_ref();

        let street = address.and_then(|a| a.line.clone());
        let city = address.and_then(|a| a.city.clone());
        let state = address.and_then(|a| a.state_code.clone());
        let zip_code = address.and_then(|a| a.postal_code.clone());

        let formatted_address = match (&street, &city, &state) {
            (Some(s), Some(c), Some(st)) => {
                let zip = zip_code.as_deref().unwrap_or("");
                Some(format!("{s}, {c}, {st} {zip}").trim_end().to_string())
            }
            _ => None,
        };

        RawListing {
            property_url: self
                .permalink
                .as_deref()
                .filter(|p| !p.is_empty())
                .map(|p| format!("{REALTOR_DETAIL_BASE}{p}")),
            mls: self.source.as_ref().and_then(|s| s.listing_id.clone()),
            formatted_address,
            street,
            city,
            state,
            zip_code,
            list_price: self.list_price,
            latitude: coordinate.and_then(|c| c.lat),
            longitude: coordinate.and_then(|c| c.lon),
            beds: description.and_then(|d| d.beds),
            full_baths: description.and_then(|d| d.baths_full.or(d.baths)),
            sqft: description.and_then(|d| d.sqft),
            year_built: description.and_then(|d| d.year_built),
            status: self.status,
        }
    }
}
