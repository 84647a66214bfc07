// src/domain/changes.rs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::domain::tier::Tier;

/// The mutable fields whose transitions are audited.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFields {
    pub price: Option<f64>,
    pub status: String,
    pub beds: Option<i64>,
    pub baths: Option<f64>,
    pub sqft: Option<i64>,
    pub price_tier: Option<Tier>,
    pub gis_tier: Option<Tier>,
    pub gis_contour: Option<i64>,
}

/// One field transition. Absent values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Value,
    pub new: Value,
}

/// Field name -> transition. Ordered so the stored JSON is stable.
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// Result of comparing an incoming snapshot with what is stored.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOutcome {
    /// Nothing stored yet: first sighting, no diff.
    Insert,
    /// Stored and identical on every tracked field.
    NoOp,
    Changed(ChangeSet),
}

/// An entry of `property_change_log`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyChangeLog {
    pub id: i64,
    pub property_id: i64,
    pub timestamp: NaiveDateTime,
    pub changes: ChangeSet,
}

impl TrackedFields {
    /// Field-level diff against an incoming snapshot, `None -> value`
    /// and `value -> None` included.
    pub fn diff(&self, new: &TrackedFields) -> ChangeSet {
        let mut changes = ChangeSet::new();

        macro_rules! compare_and_log {
            ($field:ident) => {
                if self.$field != new.$field {
                    changes.insert(
                        stringify!($field).to_string(),
                        FieldChange {
                            old: json!(self.$field),
                            new: json!(new.$field),
                        },
                    );
                }
            };
        }

        compare_and_log!(price);
        compare_and_log!(status);
        compare_and_log!(beds);
        compare_and_log!(baths);
        compare_and_log!(sqft);
        compare_and_log!(price_tier);
        compare_and_log!(gis_tier);
        compare_and_log!(gis_contour);

        changes
    }
}

/// Decides between insert, no-op and update for one upsert.
pub fn track_changes(existing: Option<&TrackedFields>, incoming: &TrackedFields) -> ChangeOutcome {
    match existing {
        None => ChangeOutcome::Insert,
        Some(current) => {
            let changes = current.diff(incoming);
            if changes.is_empty() {
                ChangeOutcome::NoOp
            } else {
                ChangeOutcome::Changed(changes)
            }
        }
    }
}
