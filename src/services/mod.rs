pub mod ingest;
pub mod jobs;
pub mod zones;

pub use ingest::ingest;
pub use jobs::{JobKind, JobReport, JobRunner, JobStatus};
pub use zones::{backfill, regenerate_zones, seed_zones};
