// source.rs
use crate::config::ScraperSettings;
use crate::scraper::models::{Property, RawListing};
use crate::scraper::ScraperError;
use rand::Rng;
use reqwest::blocking::Client;
use ::scraper::{Html, Selector};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

const REALTOR_SEARCH_BASE: &str = "https://www.realtor.com/realestateandhomes-search/";
const ZENROWS_ENDPOINT: &str = "https://api.zenrows.com/v1/";

/// Black-box producer of raw listing records for one queried location.
pub trait ListingSource {
    fn fetch(&self, location: &str, listing_types: &[String]) -> Result<Vec<RawListing>, ScraperError>;
}

/// "Charlottesville, VA" -> "Charlottesville_VA"
pub fn location_slug(location: &str) -> String {
    location
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub struct RealtorSource {
    client: Client,
    max_attempts: u32,
    max_pages: usize,
    zenrows_api_key: Option<String>,
}

impl RealtorSource {
    pub fn new(settings: &ScraperSettings) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        Ok(Self {
            client,
            max_attempts: settings.max_attempts.max(1),
            max_pages: settings.max_pages.max(1),
            zenrows_api_key: settings.zenrows_api_key.clone(),
        })
    }

    fn search_url(location: &str, listing_type: &str) -> Result<Url, ScraperError> {
        let base = Url::parse(REALTOR_SEARCH_BASE)
            .map_err(|e| ScraperError::Config(e.to_string()))?;
        let mut path = location_slug(location);
        match listing_type {
            "for_sale" => {}
            "pending" => path.push_str("/show-pending"),
            other => {
                return Err(ScraperError::Config(format!(
                    "unsupported listing type '{other}'"
                )))
            }
        }
        base.join(&path)
            .map_err(|e| ScraperError::Config(e.to_string()))
    }

    /// Walks search pages until an empty page, a repeated page, or the page cap.
    /// Fails only when the very first page cannot be fetched.
    fn fetch_all_pages(&self, base_url: &Url) -> Result<Vec<RawListing>, ScraperError> {
        let mut out = Vec::new();
        let mut seen_first_urls = HashSet::new();

        for page in 1..=self.max_pages {
            let page_url = if page == 1 {
                base_url.to_string()
            } else {
                format!("{}/pg-{page}", base_url.as_str().trim_end_matches('/'))
            };

            debug!(page, url = %page_url, "fetching search page");

            let listings = match self.fetch_page(&page_url) {
                Ok(listings) => listings,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(page, error = %e, "page failed, keeping earlier pages");
                    break;
                }
            };

            if listings.is_empty() {
                debug!(page, "no properties found, stopping");
                break;
            }

            // Realtor serves the last page again past the end.
            let first = listings[0].property_url.clone().unwrap_or_default();
            if !seen_first_urls.insert(first) {
                debug!(page, "page already seen, stopping");
                break;
            }

            out.extend(listings);
            std::thread::sleep(Duration::from_secs(2));
        }

        Ok(out)
    }

    fn fetch_page(&self, url: &str) -> Result<Vec<RawListing>, ScraperError> {
        let html = self.fetch_html(url)?;
        let data = extract_next_data(&html)?;
        extract_listings(&data)
    }

    fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        const MAX_BACKOFF_SECS: u64 = 10;
        const JITTER_MAX_SECS: u64 = 2;

        let mut last_err = None;

        for attempt in 1..=self.max_attempts {
            let start = std::time::Instant::now();

            match self.try_fetch_html(url) {
                Ok(html) => {
                    debug!(attempt, elapsed = ?start.elapsed(), "fetch succeeded");
                    return Ok(html);
                }
                Err(e) => {
                    warn!(attempt, elapsed = ?start.elapsed(), error = %e, "fetch attempt failed");
                    last_err = Some(e);

                    if attempt < self.max_attempts {
                        let base = std::cmp::min(2u64.saturating_pow(attempt), MAX_BACKOFF_SECS);
                        let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_SECS);
                        std::thread::sleep(Duration::from_secs(base + jitter));
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| ScraperError::Network("retry loop failed".into())))
    }

    fn try_fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        let request = match &self.zenrows_api_key {
            Some(api_key) => {
                let mut params = HashMap::new();
                params.insert("url", url.to_string());
                params.insert("apikey", api_key.clone());
                params.insert("original_status", "true".to_string());
                params.insert("mode", "auto".to_string());
                self.client.get(ZENROWS_ENDPOINT).query(&params)
            }
            None => self.client.get(url),
        };

        let resp = request
            .header(reqwest::header::REFERER, "https://www.google.com/")
            .send()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScraperError::Blocked(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(ScraperError::Network(format!("HTTP {status}")));
        }

        // ZenRows reports its own failures as a JSON body with a `code`.
        if text.starts_with('{') {
            if let Ok(json) = serde_json::from_str::<Value>(&text) {
                if json.get("code").is_some() {
                    return Err(ScraperError::Network(format!("proxy error: {text}")));
                }
            }
        }

        Ok(text)
    }
}

impl ListingSource for RealtorSource {
    fn fetch(&self, location: &str, listing_types: &[String]) -> Result<Vec<RawListing>, ScraperError> {
        let mut out: Vec<RawListing> = Vec::new();
        let mut seen = HashSet::new();
        let mut last_err = None;

        for listing_type in listing_types {
            let url = Self::search_url(location, listing_type)?;
            match self.fetch_all_pages(&url) {
                Ok(listings) => {
                    for listing in listings {
                        // Same listing can surface under several categories.
                        let key = listing.property_url.clone();
                        if key.is_none() || seen.insert(key) {
                            out.push(listing);
                        }
                    }
                }
                Err(e) => {
                    warn!(location, listing_type = %listing_type, error = %e, "search failed");
                    last_err = Some(e);
                }
            }
        }

        if out.is_empty() {
            if let Some(e) = last_err {
                return Err(e);
            }
        }

        info!(location, count = out.len(), "fetched listings");
        Ok(out)
    }
}

fn extract_next_data(html: &str) -> Result<Value, ScraperError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#"script[id="__NEXT_DATA__"]"#)
        .map_err(|e| ScraperError::HtmlParse(e.to_string()))?;

    let element = document
        .select(&selector)
        .next()
        .ok_or(ScraperError::MissingNextData)?;

    let json_text: String = element.text().collect();
    serde_json::from_str(&json_text).map_err(|e| ScraperError::JsonParse(e.to_string()))
}

/// Individual properties that fail to deserialize are skipped, not fatal.
fn extract_listings(data: &Value) -> Result<Vec<RawListing>, ScraperError> {
    let arr = data["props"]["pageProps"]["properties"]
        .as_array()
        .ok_or_else(|| ScraperError::UnexpectedShape("properties missing".to_string()))?;

    let mut out = Vec::with_capacity(arr.len());
    for value in arr {
        match serde_json::from_value::<Property>(value.clone()) {
            Ok(prop) => out.push(prop.into_raw_listing()),
            Err(e) => warn!(error = %e, "skipping undecodable property"),
        }
    }
    Ok(out)
}

/// Offline source: one JSON array of [`RawListing`] per location,
/// stored as `<dir>/<location-slug lowercase>.json`.
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn file_for(&self, location: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", location_slug(location).to_lowercase()))
    }
}

impl ListingSource for JsonDirSource {
    fn fetch(&self, location: &str, _listing_types: &[String]) -> Result<Vec<RawListing>, ScraperError> {
        let path = self.file_for(location);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ScraperError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| ScraperError::JsonParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(location_slug("Charlottesville, VA"), "Charlottesville_VA");
        assert_eq!(location_slug("  Crozet ,  VA 22932 "), "Crozet_VA_22932");
    }

    #[test]
    fn search_url_per_listing_type() {
        let sale = RealtorSource::search_url("Crozet, VA", "for_sale").unwrap();
        assert_eq!(sale.as_str(), "https://www.realtor.com/realestateandhomes-search/Crozet_VA");

        let pending = RealtorSource::search_url("Crozet, VA", "pending").unwrap();
        assert!(pending.as_str().ends_with("/Crozet_VA/show-pending"));

        assert!(RealtorSource::search_url("Crozet, VA", "sold").is_err());
    }

    #[test]
    fn next_data_is_extracted_from_html() {
        let html = r#"<html><body>
            <script id="__NEXT_DATA__" type="application/json">
            {"props":{"pageProps":{"properties":[
                {"permalink":"a","status":"for_sale","list_price":100000},
                {"permalink":7}
            ]}}}
            </script></body></html>"#;

        let data = extract_next_data(html).unwrap();
        let listings = extract_listings(&data).unwrap();

        // The second entry has a non-string permalink and is skipped.
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].status.as_deref(), Some("for_sale"));
    }

    #[test]
    fn missing_next_data_is_an_error() {
        let err = extract_next_data("<html></html>").unwrap_err();
        assert!(matches!(err, ScraperError::MissingNextData));
    }

    #[test]
    fn json_dir_source_reads_location_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonDirSource::new(dir.path());
        std::fs::write(
            source.file_for("Crozet, VA"),
            r#"[{"property_url":"u1","latitude":38.0,"longitude":-78.0}]"#,
        )
        .unwrap();

        let listings = source.fetch("Crozet, VA", &[]).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].property_url.as_deref(), Some("u1"));

        assert!(source.fetch("Nowhere", &[]).is_err());
    }
}
