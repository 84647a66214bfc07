// errors.rs
use thiserror::Error;

use crate::scraper::ScraperError;

/// Errors originating from the ingestion/zone pipeline
/// or from downstream layers (DB, provider, filesystem).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database Error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Invalid Input: {0}")]
    InvalidInput(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    /// Isochrone provider failed (non-2xx, timeout, malformed body).
    #[error("Zone generation failed: {0}")]
    ZoneGeneration(String),

    /// Nothing usable to insert; the existing zone set was left untouched.
    #[error("No valid zones to insert")]
    EmptyZoneSet,

    #[error("Listing source error: {0}")]
    Source(#[from] ScraperError),

    #[error("Export Error: {0}")]
    Export(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

// Type alias used throughout the core.
pub type Result<T> = std::result::Result<T, AppError>;
