pub mod batch_import;
pub mod export_segments;
pub mod import;
pub mod import_edited;
pub mod import_landings;
pub mod migrate;

pub use batch_import::handle_batch_import;
pub use export_segments::handle_export_segments;
pub use import::handle_import;
pub use import_edited::handle_import_edited;
pub use import_landings::handle_import_landings;
pub use migrate::handle_migrate;

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tracing::info;

use overflights::config::{AppConfig, ImportParams};
use overflights::converter::GpsBabel;
use overflights::flight_store::{FlightStore, MemoryFlightStore};
use overflights::flights::SubmissionMethod;
use overflights::flights_repo::{self, PgFlightStore};
use overflights::readers::ReaderRegistry;
use overflights::track_formatter::TrackFormatter;

/// Import settings shared by every track command. Unset options fall back to
/// the `[import]` table of the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ImportArgs {
    /// Minimum minutes between two points that starts a new flight segment
    #[arg(long)]
    pub seg_time_diff: Option<u32>,

    /// Points closer than this many meters to their predecessor and recorded
    /// at the same time are removed
    #[arg(short = 'd', long)]
    pub min_point_distance: Option<f64>,

    /// Tail (N-) number of the aircraft
    #[arg(short = 'r', long)]
    pub registration: Option<String>,

    /// manual, survey123, legacy or other
    #[arg(long)]
    pub submission_method: Option<SubmissionMethod>,

    /// Three character code of the operator
    #[arg(short = 'o', long)]
    pub operator_code: Option<String>,

    /// Model name of the aircraft
    #[arg(short = 't', long)]
    pub aircraft_type: Option<String>,

    /// Import new segments even when some already exist
    #[arg(short = 'f', long)]
    pub force_import: bool,

    /// Skip segments that already exist without failing
    #[arg(long)]
    pub ignore_duplicate_flights: bool,

    /// Recorded as the submitter of the flights
    #[arg(long, env = "USER")]
    pub submitted_by: Option<String>,
}

impl ImportArgs {
    pub fn apply(&self, base: &ImportParams) -> ImportParams {
        let mut params = base.clone();
        if let Some(v) = self.seg_time_diff {
            params.seg_time_diff = v;
        }
        if let Some(v) = self.min_point_distance {
            params.min_point_distance = v;
        }
        if self.registration.is_some() {
            params.registration = self.registration.clone();
        }
        if let Some(v) = self.submission_method {
            params.submission_method = v;
        }
        if self.operator_code.is_some() {
            params.operator_code = self.operator_code.clone();
        }
        if self.aircraft_type.is_some() {
            params.aircraft_type = self.aircraft_type.clone();
        }
        params.force_import |= self.force_import;
        params.ignore_duplicate_flights |= self.ignore_duplicate_flights;
        if self.submitted_by.is_some() {
            params.submitted_by = self.submitted_by.clone();
        }
        params
    }
}

/// Track formatter wired to the configured converter and time zone
pub fn build_formatter(config: &AppConfig) -> Result<Arc<TrackFormatter>> {
    let converter = GpsBabel::new(config.converter.program.clone(), config.converter.timeout());
    let registry = ReaderRegistry::standard(Arc::new(converter));
    Ok(Arc::new(TrackFormatter::new(registry, config.tz()?)))
}

/// The PostgreSQL store, or an empty in-memory one for dry runs
pub fn open_store(dry_run: bool) -> Result<Box<dyn FlightStore>> {
    if dry_run {
        info!("Dry run: nothing will be written to the database");
        return Ok(Box::new(MemoryFlightStore::new()));
    }
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = flights_repo::connect(&database_url)?;
    Ok(Box::new(PgFlightStore::new(pool)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config_defaults() {
        let base = ImportParams {
            seg_time_diff: 20,
            operator_code: Some("NPS".into()),
            ..Default::default()
        };
        let args = ImportArgs {
            min_point_distance: Some(50.0),
            force_import: true,
            ..Default::default()
        };
        let params = args.apply(&base);
        assert_eq!(params.seg_time_diff, 20);
        assert_eq!(params.min_point_distance, 50.0);
        assert_eq!(params.operator_code.as_deref(), Some("NPS"));
        assert!(params.force_import);
    }
}
