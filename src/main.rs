use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::db::connection::{init_db, Database};
use crate::errors::{AppError, Result};
use crate::gis::{match_zone, LatLon, ValhallaClient};
use crate::scraper::{JsonDirSource, ListingSource, RealtorSource};
use crate::services::{JobKind, JobReport, JobRunner, JobStatus};

mod config;
mod db;
mod domain;
mod errors;
mod gis;
mod scraper;
mod services;
mod spreadsheets;

#[cfg(test)]
mod tests;

#[derive(Debug, Parser)]
#[command(name = "house_hunter", about = "Listing ingestion, zone tiering and change tracking")]
struct Cli {
    /// TOML configuration file; defaults apply when it does not exist.
    #[arg(long, short, default_value = "config.toml", env = "HUNTER_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the schema if it does not exist yet.
    InitDb,
    /// Fetch listings for each location and upsert them.
    Ingest {
        /// Overrides the configured locations (repeatable).
        #[arg(long = "location")]
        locations: Vec<String>,
        /// Read `<dir>/<location>.json` files instead of scraping.
        #[arg(long)]
        source_dir: Option<PathBuf>,
    },
    /// Request isochrones and replace the zone set, then backfill.
    RegenerateZones {
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
        #[arg(long, value_delimiter = ',')]
        durations: Vec<u32>,
        #[arg(long)]
        costing: Option<String>,
    },
    /// Replace the zone set from a GeoJSON file, tiered by threshold.
    SeedZones { file: PathBuf },
    /// Recompute the zone fields of every stored listing.
    Backfill,
    /// Print the zone match for a coordinate.
    Match {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Print the active zone set as a FeatureCollection.
    Zones,
    /// Print every stored listing.
    Listings,
    /// Print the change history of one listing, newest first.
    History {
        #[arg(required_unless_present = "url", conflicts_with = "url")]
        id: Option<i64>,
        /// Look the listing up by its property URL instead of its id.
        #[arg(long)]
        url: Option<String>,
    },
    /// Print recent job runs.
    Jobs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Write listings and their change history to an .xlsx file.
    Export { file: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = AppConfig::load(&cli.config)?;
    let db = Database::new(&cfg.database_path);
    init_db(&db)?;

    let runner = JobRunner::new(db.clone());

    match cli.command {
        Command::InitDb => {
            let (zones, listings) = db.with_conn(|conn| {
                Ok((
                    crate::db::zones::count_zones(conn)?,
                    crate::db::listings::count_listings(conn)?,
                ))
            })?;
            info!(path = %cfg.database_path, zones, listings, "schema ready");
            Ok(())
        }

        Command::Ingest {
            locations,
            source_dir,
        } => {
            let locations = if locations.is_empty() {
                cfg.locations.clone()
            } else {
                locations
            };
            if locations.is_empty() {
                return Err(AppError::InvalidInput(
                    "no locations configured; pass --location".into(),
                ));
            }

            let source: Box<dyn ListingSource + Send> =
                match source_dir.or_else(|| cfg.scraper.source_dir.clone()) {
                    Some(dir) => Box::new(JsonDirSource::new(dir)),
                    None => Box::new(RealtorSource::new(&cfg.scraper)?),
                };

            let listing_types = cfg.scraper.listing_types.clone();
            let handle = runner.spawn(JobKind::Ingest, move |db| {
                let summary = services::ingest(db, source.as_ref(), &locations, &listing_types)?;
                print_json(&summary)?;
                Ok((summary.new + summary.updated) as i64)
            });
            let report = handle
                .join()
                .map_err(|_| AppError::Internal("ingest worker panicked".into()))?;
            finish(report)
        }

        Command::RegenerateZones {
            lat,
            lon,
            durations,
            costing,
        } => {
            let iso = &cfg.isochrone;
            let (Some(lat), Some(lon)) = (lat.or(iso.center_lat), lon.or(iso.center_lon)) else {
                return Err(AppError::InvalidInput(
                    "a center is required: pass --lat/--lon or set isochrone.center_lat/center_lon".into(),
                ));
            };
            let durations = if durations.is_empty() {
                iso.durations.clone()
            } else {
                durations
            };
            let costing = costing.unwrap_or_else(|| iso.costing.clone());
            let provider = ValhallaClient::new(iso)?;

            let report = runner.run(JobKind::RegenerateZones, |db| {
                let outcome =
                    services::regenerate_zones(db, &provider, LatLon { lat, lon }, &durations, &costing)?;
                print_json(&outcome)?;
                Ok(outcome.inserted as i64)
            });
            finish(report)
        }

        Command::SeedZones { file } => {
            let raw = std::fs::read_to_string(&file)?;
            let doc: Value = serde_json::from_str(&raw)?;
            let thresholds = cfg.zones.tiers;

            let report = runner.run(JobKind::SeedZones, |db| {
                let outcome = services::seed_zones(db, &doc, &thresholds)?;
                print_json(&outcome)?;
                Ok(outcome.inserted as i64)
            });
            finish(report)
        }

        Command::Backfill => {
            let report = runner.run(JobKind::Backfill, |db| {
                let updated = services::backfill(db)?;
                println!("{updated} listings updated");
                Ok(updated as i64)
            });
            finish(report)
        }

        Command::Match { lat, lon } => match match_zone(&db, lat, lon) {
            Some(zone) => print_json(&zone),
            None => {
                println!("unzoned");
                Ok(())
            }
        },

        Command::Zones => {
            let fc = db.with_conn(|conn| crate::db::zones::zones_feature_collection(conn))?;
            print_json(&fc)
        }

        Command::Listings => {
            let listings = db.with_conn(|conn| crate::db::listings::list_listings(conn))?;
            print_json(&listings)
        }

        Command::History { id, url } => {
            let history = db.with_conn(|conn| {
                let listing = match (id, url.as_deref()) {
                    (Some(id), _) => crate::db::listings::get_listing(conn, id)?
                        .ok_or_else(|| AppError::NotFound(format!("listing {id}")))?,
                    (None, Some(url)) => crate::db::listings::find_listing_by_external_id(conn, url)?
                        .ok_or_else(|| AppError::NotFound(format!("listing {url}")))?,
                    (None, None) => {
                        return Err(AppError::InvalidInput("pass a listing id or --url".into()))
                    }
                };
                crate::db::change_log::change_log_for(conn, listing.id)
            })?;
            print_json(&history)
        }

        Command::Jobs { limit } => print_json(&runner.recent(limit)?),

        Command::Export { file } => {
            let (listings, changes) = db.with_conn(|conn| {
                Ok((
                    crate::db::listings::list_listings(conn)?,
                    crate::db::change_log::all_change_logs(conn)?,
                ))
            })?;
            let bytes = spreadsheets::export_listings_xlsx(&listings, &changes)?;
            std::fs::write(&file, bytes)?;
            info!(path = %file.display(), listings = listings.len(), "export written");
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn finish(report: JobReport) -> Result<()> {
    match report.status {
        JobStatus::Succeeded { .. } => Ok(()),
        JobStatus::Failed { error } => Err(AppError::Internal(format!(
            "{} job failed: {error}",
            report.kind.as_str()
        ))),
    }
}
