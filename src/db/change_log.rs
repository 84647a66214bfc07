use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};

use crate::domain::{ChangeSet, PropertyChangeLog};
use crate::errors::Result;

/// Appends one entry holding the full change set of an upsert.
pub fn insert_change_log(
    conn: &Connection,
    property_id: i64,
    changes: &ChangeSet,
    now: NaiveDateTime,
) -> Result<i64> {
    let changes_json = serde_json::to_string(changes)?;
    conn.execute(
        r#"
        INSERT INTO property_change_log (property_id, timestamp, changes)
        VALUES (?1, ?2, ?3)
        "#,
        params![property_id, now, changes_json],
    )?;
    Ok(conn.last_insert_rowid())
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<PropertyChangeLog> {
    let raw: String = row.get(3)?;
    let changes: ChangeSet = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(PropertyChangeLog {
        id: row.get(0)?,
        property_id: row.get(1)?,
        timestamp: row.get(2)?,
        changes,
    })
}

/// A listing's history, newest first.
pub fn change_log_for(conn: &Connection, property_id: i64) -> Result<Vec<PropertyChangeLog>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, property_id, timestamp, changes
        FROM property_change_log
        WHERE property_id = ?1
        ORDER BY timestamp DESC, id DESC
        "#,
    )?;

    let rows = stmt.query_map(params![property_id], entry_from_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Every entry across all listings, newest first. Used by the export.
pub fn all_change_logs(conn: &Connection) -> Result<Vec<PropertyChangeLog>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, property_id, timestamp, changes
        FROM property_change_log
        ORDER BY timestamp DESC, id DESC
        "#,
    )?;

    let rows = stmt.query_map([], entry_from_row)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
