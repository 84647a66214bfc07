use chrono::Utc;
use serde::Serialize;
use std::sync::Mutex;
use std::thread::JoinHandle;
use tracing::{error, info, warn};

use crate::db::connection::Database;
use crate::db::job_runs::{end_job_run, recent_job_runs, start_job_run, JobRun};
use crate::errors::Result;

// One writer at a time across every runner in the process.
static WRITER_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobKind {
    Ingest,
    RegenerateZones,
    SeedZones,
    Backfill,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Ingest => "ingest",
            JobKind::RegenerateZones => "regenerate_zones",
            JobKind::SeedZones => "seed_zones",
            JobKind::Backfill => "backfill",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum JobStatus {
    Succeeded { processed: i64 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// `None` if the run could not be recorded in `job_runs`.
    pub run_id: Option<i64>,
    pub kind: JobKind,
    pub status: JobStatus,
}

/// Runs mutating jobs one at a time and records each run.
#[derive(Debug, Clone)]
pub struct JobRunner {
    db: Database,
}

impl JobRunner {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Runs `job` on the calling thread. The job returns the number of
    /// items it processed; errors become a failed report, never a panic.
    pub fn run<F>(&self, kind: JobKind, job: F) -> JobReport
    where
        F: FnOnce(&Database) -> Result<i64>,
    {
        let _guard = WRITER_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let run_id = match self
            .db
            .with_conn(|conn| start_job_run(conn, kind.as_str(), Utc::now().naive_utc()))
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(job = kind.as_str(), error = %e, "could not record job start");
                None
            }
        };

        info!(job = kind.as_str(), ?run_id, "job started");
        let result = job(&self.db);

        let status = match result {
            Ok(processed) => {
                info!(job = kind.as_str(), processed, "job succeeded");
                JobStatus::Succeeded { processed }
            }
            Err(e) => {
                error!(job = kind.as_str(), error = %e, "job failed");
                JobStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        if let Some(id) = run_id {
            let (success, processed, message) = match &status {
                JobStatus::Succeeded { processed } => (true, Some(*processed), None),
                JobStatus::Failed { error } => (false, None, Some(error.as_str())),
            };
            let recorded = self.db.with_conn(|conn| {
                end_job_run(conn, id, Utc::now().naive_utc(), success, processed, message)
            });
            if let Err(e) = recorded {
                warn!(job = kind.as_str(), run_id = id, error = %e, "could not record job end");
            }
        }

        JobReport {
            run_id,
            kind,
            status,
        }
    }

    /// Same as [`JobRunner::run`] on a background thread; join the handle
    /// to collect the report.
    pub fn spawn<F>(&self, kind: JobKind, job: F) -> JoinHandle<JobReport>
    where
        F: FnOnce(&Database) -> Result<i64> + Send + 'static,
    {
        let runner = self.clone();
        std::thread::spawn(move || runner.run(kind, job))
    }

    pub fn recent(&self, limit: i64) -> Result<Vec<JobRun>> {
        self.db.with_conn(|conn| recent_job_runs(conn, limit))
    }
}
