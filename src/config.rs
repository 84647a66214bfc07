// config.rs
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::{AppError, Result};
use crate::gis::tiering::TierThresholds;

/// Top-level application configuration, loaded from TOML.
/// Every section has defaults so a missing file still yields a usable config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    /// Locations handed to the listing source on every ingestion run.
    pub locations: Vec<String>,
    pub scraper: ScraperSettings,
    pub zones: ZoneSettings,
    pub isochrone: IsochroneSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    pub listing_types: Vec<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub max_pages: usize,
    pub zenrows_api_key: Option<String>,
    /// Offline source: `<dir>/<location-slug>.json` files instead of live pages.
    pub source_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    pub tiers: TierThresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IsochroneSettings {
    pub base_url: String,
    pub costing: String,
    pub timeout_secs: u64,
    pub center_lat: Option<f64>,
    pub center_lon: Option<f64>,
    pub durations: Vec<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "house_hunter.sqlite3".to_string(),
            locations: Vec::new(),
            scraper: ScraperSettings::default(),
            zones: ZoneSettings::default(),
            isochrone: IsochroneSettings::default(),
        }
    }
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            listing_types: vec!["for_sale".to_string(), "pending".to_string()],
            timeout_secs: 60,
            max_attempts: 3,
            max_pages: 10,
            zenrows_api_key: None,
            source_dir: None,
        }
    }
}

impl Default for IsochroneSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            costing: "auto".to_string(),
            timeout_secs: 30,
            center_lat: None,
            center_lon: None,
            durations: vec![15, 30, 45],
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: AppConfig =
            toml::from_str(raw).map_err(|e| AppError::Config(format!("invalid TOML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    /// Environment overrides are applied last.
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path)?;
            let cfg = Self::from_toml_str(&raw)?;
            info!(path = %path.display(), "configuration loaded");
            cfg
        } else {
            warn!(path = %path.display(), "config file not found, using defaults");
            AppConfig::default()
        };

        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("HUNTER_DATABASE") {
            self.database_path = path;
        }
        if let Ok(key) = std::env::var("ZENROWS_API_KEY") {
            self.scraper.zenrows_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("HUNTER_ISOCHRONE_URL") {
            self.isochrone.base_url = url;
        }
    }

    fn validate(&self) -> Result<()> {
        let t = &self.zones.tiers;
        if !(t.gold <= t.silver && t.silver <= t.bronze) {
            return Err(AppError::Config(format!(
                "zone tier thresholds must be ascending (gold={}, silver={}, bronze={})",
                t.gold, t.silver, t.bronze
            )));
        }
        if self.scraper.max_attempts == 0 {
            return Err(AppError::Config("scraper.max_attempts must be >= 1".into()));
        }
        Ok(())
    }
}
