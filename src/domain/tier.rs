// src/domain/tier.rs

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordinal desirability tier shared by zones and listings.
/// Declaration order is rank order: `Gold < Silver < Bronze`, so the
/// smallest value is the best tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Gold,
    Silver,
    Bronze,
}

impl Tier {
    /// Tiers in rank order, best first.
    pub const RANKED: [Tier; 3] = [Tier::Gold, Tier::Silver, Tier::Bronze];

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Gold => "gold",
            Tier::Silver => "silver",
            Tier::Bronze => "bronze",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gold" => Ok(Tier::Gold),
            "silver" => Ok(Tier::Silver),
            "bronze" => Ok(Tier::Bronze),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

impl ToSql for Tier {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Tier {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

pub const PRICE_GOLD_MAX: f64 = 220_000.0;
pub const PRICE_SILVER_MAX: f64 = 250_000.0;
pub const PRICE_BRONZE_MAX: f64 = 275_000.0;

/// Classifies a listing price. Bounds are inclusive; anything above the
/// bronze bound, or an absent price, has no tier.
pub fn price_tier(price: Option<f64>) -> Option<Tier> {
    let price = price?;
    if price <= PRICE_GOLD_MAX {
        Some(Tier::Gold)
    } else if price <= PRICE_SILVER_MAX {
        Some(Tier::Silver)
    } else if price <= PRICE_BRONZE_MAX {
        Some(Tier::Bronze)
    } else {
        None
    }
}
