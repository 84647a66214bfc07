pub mod models;
mod scraper_error;
pub mod source;

pub use models::RawListing;
pub use scraper_error::ScraperError;
pub use source::{JsonDirSource, ListingSource, RealtorSource};
