use crate::db::connection::{init_db, Database};
use crate::errors::{AppError, Result};
use crate::gis::features::{feature, feature_collection, tagged_features, TaggedFeature};
use crate::gis::geometry::square;
use crate::gis::{IsochroneProvider, LatLon};
use crate::scraper::{ListingSource, RawListing, ScraperError};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use tempfile::TempDir;

/// A fresh database file inside its own temp dir. The dir is removed when
/// the value is dropped, so keep it alive for the whole test.
pub struct TestDb {
    _dir: TempDir,
    pub db: Database,
}

pub fn init_test_db() -> TestDb {
    let dir = TempDir::new().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
    let db = Database::new(dir.path().join("test.sqlite3"));

    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    TestDb { _dir: dir, db }
}

pub fn raw_listing(url: &str, price: f64, lat: f64, lon: f64) -> RawListing {
    RawListing {
        property_url: Some(url.to_string()),
        formatted_address: Some(format!("{url} address")),
        list_price: Some(price),
        latitude: Some(lat),
        longitude: Some(lon),
        beds: Some(3),
        full_baths: Some(2.0),
        sqft: Some(1600),
        status: Some("for_sale".to_string()),
        ..RawListing::default()
    }
}

/// Three nested squares centred near (0.5, 0.5): 15 min inside 30 inside 45.
pub fn nested_collection(contours: [f64; 3]) -> Value {
    feature_collection(vec![
        feature(square(0.4, 0.4, 0.2), json!({ "contour": contours[0] })),
        feature(square(0.2, 0.2, 0.6), json!({ "contour": contours[1] })),
        feature(square(0.0, 0.0, 1.0), json!({ "contour": contours[2] })),
    ])
}

/// Returns a canned feature collection, or a provider failure.
pub struct FakeProvider {
    pub response: Option<Value>,
    pub requested: RefCell<Vec<u32>>,
}

impl FakeProvider {
    pub fn returning(doc: Value) -> Self {
        Self {
            response: Some(doc),
            requested: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            requested: RefCell::new(Vec::new()),
        }
    }
}

impl IsochroneProvider for FakeProvider {
    fn fetch(&self, _center: LatLon, _costing: &str, durations: &[u32]) -> Result<Vec<TaggedFeature>> {
        self.requested.borrow_mut().extend_from_slice(durations);
        match &self.response {
            Some(doc) => Ok(tagged_features(doc)),
            None => Err(AppError::ZoneGeneration("HTTP 503 from provider".into())),
        }
    }
}

/// In-memory listing source keyed by location. Unknown locations fail.
#[derive(Default)]
pub struct StaticSource {
    pub by_location: HashMap<String, Vec<RawListing>>,
}

impl StaticSource {
    pub fn with(mut self, location: &str, records: Vec<RawListing>) -> Self {
        self.by_location.insert(location.to_string(), records);
        self
    }
}

impl ListingSource for StaticSource {
    fn fetch(&self, location: &str, _listing_types: &[String]) -> std::result::Result<Vec<RawListing>, ScraperError> {
        self.by_location
            .get(location)
            .cloned()
            .ok_or_else(|| ScraperError::Blocked(format!("no data for {location}")))
    }
}

pub fn listing_types() -> Vec<String> {
    vec!["for_sale".to_string()]
}
