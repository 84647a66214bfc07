pub mod changes;
pub mod listing;
pub mod tier;

pub use changes::{track_changes, ChangeOutcome, ChangeSet, PropertyChangeLog, TrackedFields};
pub use listing::{NormalizedListing, PropertyListing};
pub use tier::Tier;
