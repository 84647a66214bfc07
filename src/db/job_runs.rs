use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::errors::Result;

#[derive(Debug, Clone, Serialize)]
pub struct JobRun {
    pub id: i64,
    pub kind: String,
    pub started_at: NaiveDateTime,
    pub finished_at: Option<NaiveDateTime>,
    pub success: Option<bool>,
    pub processed: Option<i64>,
    pub error_message: Option<String>,
}

pub fn start_job_run(conn: &Connection, kind: &str, now: NaiveDateTime) -> Result<i64> {
    conn.execute(
        "INSERT INTO job_runs (kind, started_at) VALUES (?1, ?2)",
        params![kind, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn end_job_run(
    conn: &Connection,
    run_id: i64,
    now: NaiveDateTime,
    success: bool,
    processed: Option<i64>,
    error: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE job_runs SET finished_at = ?1, success = ?2, processed = ?3, error_message = ?4 WHERE id = ?5",
        params![now, success, processed, error, run_id],
    )?;
    Ok(())
}

pub fn recent_job_runs(conn: &Connection, limit: i64) -> Result<Vec<JobRun>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, kind, started_at, finished_at, success, processed, error_message
        FROM job_runs
        ORDER BY started_at DESC, id DESC
        LIMIT ?1
        "#,
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        Ok(JobRun {
            id: row.get(0)?,
            kind: row.get(1)?,
            started_at: row.get(2)?,
            finished_at: row.get(3)?,
            success: row.get(4)?,
            processed: row.get(5)?,
            error_message: row.get(6)?,
        })
    })?;

    let mut runs = Vec::new();
    for r in rows {
        runs.push(r?);
    }
    Ok(runs)
}
