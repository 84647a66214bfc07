// src/gis/isochrone.rs

use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::config::IsochroneSettings;
use crate::errors::{AppError, Result};
use crate::gis::features::{tagged_features, TaggedFeature};

/// Center of an isochrone request, WGS84.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// External travel-time contour service.
/// Any failure surfaces as a single `AppError::ZoneGeneration`.
pub trait IsochroneProvider {
    fn fetch(&self, center: LatLon, costing: &str, durations: &[u32]) -> Result<Vec<TaggedFeature>>;
}

/// Valhalla-compatible `/isochrone` endpoint.
pub struct ValhallaClient {
    client: Client,
    endpoint: Url,
}

impl ValhallaClient {
    pub fn new(settings: &IsochroneSettings) -> Result<Self> {
        let base = Url::parse(&settings.base_url)
            .map_err(|e| AppError::Config(format!("isochrone base_url: {e}")))?;
        // Append under any path prefix the base carries.
        let mut endpoint = base;
        endpoint
            .path_segments_mut()
            .map_err(|_| AppError::Config(format!("isochrone base_url cannot be a base: {}", settings.base_url)))?
            .pop_if_empty()
            .push("isochrone");

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::ZoneGeneration(format!("client init: {e}")))?;

        Ok(Self { client, endpoint })
    }

    pub fn request_body(center: LatLon, costing: &str, durations: &[u32]) -> Value {
        let contours: Vec<Value> = durations.iter().map(|m| json!({ "time": m })).collect();
        json!({
            "locations": [{ "lat": center.lat, "lon": center.lon }],
            "costing": costing,
            "contours": contours,
            "polygons": true,
        })
    }
}

impl IsochroneProvider for ValhallaClient {
    fn fetch(&self, center: LatLon, costing: &str, durations: &[u32]) -> Result<Vec<TaggedFeature>> {
        let body = Self::request_body(center, costing, durations);
        debug!(endpoint = %self.endpoint, %body, "requesting isochrones");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::ZoneGeneration("isochrone request timed out".into())
                } else {
                    AppError::ZoneGeneration(format!("isochrone request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_else(|_| "(no body)".to_string());
            return Err(AppError::ZoneGeneration(format!(
                "isochrone provider returned {status}: {text}"
            )));
        }

        let doc: Value = response
            .json()
            .map_err(|e| AppError::ZoneGeneration(format!("malformed isochrone body: {e}")))?;

        let features = tagged_features(&doc);
        info!(count = features.len(), "isochrone features received");
        Ok(features)
    }
}
