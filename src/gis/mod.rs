pub mod features;
pub mod geometry;
pub mod isochrone;
pub mod matcher;
pub mod tiering;

pub use isochrone::{IsochroneProvider, LatLon, ValhallaClient};
pub use matcher::{match_zone, ZoneIndex, ZoneMatch};
pub use tiering::{NewZone, TierThresholds};
