pub mod change_log;
pub mod connection;
pub mod job_runs;
pub mod listings;
pub mod zones;
