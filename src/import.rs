//! Decides which formatted flights are new, writes them, and performs the
//! post-insert housekeeping for the source file.

use anyhow::Result;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};

use crate::archive;
use crate::config::ImportParams;
use crate::diagnostics::Diagnostics;
use crate::error::{DuplicateFlight, ImportError};
use crate::flight_store::FlightStore;
use crate::flights::{FlightSegment, ImportBatch};
use crate::track_formatter::{FormattedTrack, TrackFormatter};

/// What one file's import did
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub source_file: PathBuf,
    pub archived_to: Option<PathBuf>,
    /// Flight ids written to the store
    pub inserted: Vec<String>,
    /// Candidates that matched a stored flight
    pub skipped: Vec<DuplicateFlight>,
    pub diagnostics: Diagnostics,
}

impl ImportSummary {
    fn empty(source_file: &Path, diagnostics: Diagnostics) -> Self {
        Self {
            source_file: source_file.to_path_buf(),
            archived_to: None,
            inserted: Vec::new(),
            skipped: Vec::new(),
            diagnostics,
        }
    }

    pub fn message(&self) -> String {
        format!("{} flight tracks imported", self.inserted.len())
    }

    /// (registration, departure) of every skipped duplicate
    pub fn skipped_pairs(&self) -> Vec<(String, NaiveDateTime)> {
        self.skipped
            .iter()
            .map(|d| (d.registration.clone(), d.departure))
            .collect()
    }
}

/// Candidates that overlap a stored flight of the same registration.
/// Matching is on time windows, never on flight id equality.
pub async fn find_duplicates(
    store: &dyn FlightStore,
    flights: &[FlightSegment],
) -> Result<Vec<DuplicateFlight>> {
    let mut duplicates = Vec::new();
    for flight in flights {
        let existing = store
            .find_overlapping(
                &flight.registration,
                flight.departure_datetime,
                flight.landing_datetime,
            )
            .await?;
        if let Some(stored) = existing.first() {
            duplicates.push(DuplicateFlight {
                registration: flight.registration.clone(),
                departure: flight.departure_datetime,
                existing_flight_id: stored.flight_id.clone(),
            });
        }
    }
    Ok(duplicates)
}

/// Two segments of one file that floor to the same departure bucket cannot
/// both be stored under that id
fn check_unique_flight_ids(flights: &[FlightSegment]) -> Result<()> {
    let mut seen: HashMap<&str, u32> = HashMap::new();
    for f in flights {
        if let Some(other) = seen.insert(f.flight_id.as_str(), f.segment_id) {
            anyhow::bail!(
                "Segments {} and {} both map to flight id {}; move the manual split so they depart in different time windows",
                other,
                f.segment_id,
                f.flight_id
            );
        }
    }
    Ok(())
}

/// A new segment that does not overlap any stored flight can still floor into
/// the same departure bucket as one, and so share its flight id
async fn check_stored_flight_ids(store: &dyn FlightStore, flights: &[FlightSegment]) -> Result<()> {
    let ids: Vec<String> = flights.iter().map(|f| f.flight_id.clone()).collect();
    let taken = store.find_by_flight_ids(&ids).await?;
    if let Some(stored) = taken.first()
        && let Some(flight) = flights.iter().find(|f| f.flight_id == stored.flight_id)
    {
        return Err(ImportError::FlightIdTaken {
            flight_id: stored.flight_id.clone(),
            departure: flight.departure_datetime,
            existing_departure: stored.departure_datetime,
            existing_landing: stored.landing_datetime,
        }
        .into());
    }
    Ok(())
}

/// Insert the genuinely new flights of a formatted track.
///
/// Duplicates abort the import unless `force_import` or
/// `ignore_duplicate_flights` is set. With `force_import` an import that
/// leaves nothing to insert is an error; with `ignore_duplicate_flights` it
/// returns an empty summary. After a successful insert the source file is
/// archived (when `archive_dir` is given) and store maintenance runs; failures
/// of either are recorded as warnings only.
pub async fn import_track(
    store: &dyn FlightStore,
    track: FormattedTrack,
    params: &ImportParams,
    archive_dir: Option<&Path>,
) -> Result<ImportSummary> {
    let FormattedTrack {
        source,
        flights,
        points,
        mut diagnostics,
        ..
    } = track;

    let mut batch = ImportBatch::build(&flights, &points);
    let dropped = flights.len() - batch.flights.len();
    if dropped > 0 {
        diagnostics.info(format!(
            "{dropped} single-point or zero-length segment(s) were not imported"
        ));
    }
    if batch.is_empty() {
        return Err(ImportError::NoFlightSegments(source).into());
    }
    check_unique_flight_ids(&batch.flights)?;

    let total = batch.flights.len();
    let duplicates = find_duplicates(store, &batch.flights).await?;
    if !duplicates.is_empty() {
        metrics::counter!("import.flights.duplicate_total").increment(duplicates.len() as u64);
        let all_existing = duplicates.len() == total;

        if !params.force_import && !params.ignore_duplicate_flights {
            return Err(ImportError::DuplicateFlights {
                duplicates,
                total,
                all_existing,
            }
            .into());
        }

        diagnostics.warn(
            ImportError::DuplicateFlights {
                duplicates: duplicates.clone(),
                total,
                all_existing,
            }
            .to_string(),
        );

        if all_existing {
            if params.force_import {
                return Err(ImportError::NoNewFlights.into());
            }
            let mut summary = ImportSummary::empty(&source, diagnostics);
            summary.skipped = duplicates;
            return Ok(summary);
        }

        let new_ids: Vec<String> = batch
            .flights
            .iter()
            .filter(|f| {
                !duplicates
                    .iter()
                    .any(|d| d.registration == f.registration && d.departure == f.departure_datetime)
            })
            .map(|f| f.flight_id.clone())
            .collect();
        batch.retain_flights(&new_ids);
        if batch.is_empty() {
            return Err(ImportError::NoNewFlights.into());
        }
        return finish_import(store, batch, source, duplicates, diagnostics, archive_dir).await;
    }

    finish_import(store, batch, source, Vec::new(), diagnostics, archive_dir).await
}

/// Format one track file off the async runtime, then import it
pub async fn import_file(
    formatter: &Arc<TrackFormatter>,
    store: &dyn FlightStore,
    path: &Path,
    params: &ImportParams,
    archive_dir: Option<&Path>,
) -> Result<ImportSummary> {
    let span = info_span!("import_file", path = %path.display());
    async move {
        let formatter = Arc::clone(formatter);
        let owned_path = path.to_path_buf();
        let owned_params = params.clone();
        let track = tokio::task::spawn_blocking(move || {
            formatter.format_track(&owned_path, &owned_params)
        })
        .await??;
        import_track(store, track, params, archive_dir).await
    }
    .instrument(span)
    .await
}

async fn finish_import(
    store: &dyn FlightStore,
    mut batch: ImportBatch,
    source: PathBuf,
    skipped: Vec<DuplicateFlight>,
    mut diagnostics: Diagnostics,
    archive_dir: Option<&Path>,
) -> Result<ImportSummary> {
    check_stored_flight_ids(store, &batch.flights).await?;

    // The stored source path is where the file is about to be archived
    let destination = match archive_dir {
        Some(dir) => match archive::destination_for(&source, dir) {
            Ok(dest) => Some(dest),
            Err(e) => {
                diagnostics.warn_maintainer(format!("Could not choose an archive path: {e:#}"));
                None
            }
        },
        None => None,
    };
    let source_file = destination.as_deref().unwrap_or(&source).display().to_string();
    for flight in &mut batch.flights {
        flight.source_file = Some(source_file.clone());
    }

    let inserted = store.insert_batch(&batch).await?;
    metrics::counter!("import.flights.inserted_total").increment(inserted.len() as u64);
    info!("Inserted {} flights from {:?}", inserted.len(), source);

    let mut archived_to = None;
    if let Some(destination) = destination {
        match archive::archive_to(&source, &destination) {
            Ok(path) => archived_to = Some(path),
            Err(e) => diagnostics.warn_maintainer(format!(
                "Flights were imported but {} could not be archived: {e:#}",
                source.display()
            )),
        }
    }

    if let Err(e) = store.maintain().await {
        warn!("Post-import maintenance failed: {:#}", e);
        diagnostics.warn_maintainer(format!("Post-import maintenance failed: {e:#}"));
    }

    diagnostics.info(format!("{} flight tracks imported", inserted.len()));
    Ok(ImportSummary {
        source_file: source,
        archived_to,
        inserted,
        skipped,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight_store::MemoryFlightStore;
    use crate::flights::SubmissionMethod;
    use chrono::{Duration, NaiveDate, Utc};

    fn flight(flight_id: &str, registration: &str, start_min: i64, end_min: i64) -> FlightSegment {
        let base = NaiveDate::from_ymd_opt(2021, 7, 4).unwrap().and_hms_opt(10, 0, 0).unwrap();
        FlightSegment {
            flight_id: flight_id.into(),
            segment_id: 0,
            registration: registration.into(),
            departure_datetime: base + Duration::minutes(start_min),
            landing_datetime: base + Duration::minutes(end_min),
            duration_hrs: (end_min - start_min) as f64 / 60.0,
            operator_code: None,
            aircraft_type: None,
            submission_method: SubmissionMethod::Manual,
            submission_time: Utc::now(),
            submitted_by: None,
            source_file: None,
        }
    }

    #[tokio::test]
    async fn test_overlap_not_identity() {
        let store = MemoryFlightStore::new();
        store
            .insert_batch(&ImportBatch {
                flights: vec![flight("N123AB_202107041000", "N123AB", 0, 30)],
                ..Default::default()
            })
            .await
            .unwrap();

        // Different id, overlapping window, same aircraft
        let dup = find_duplicates(&store, &[flight("N123AB_202107041015", "N123AB", 20, 60)])
            .await
            .unwrap();
        assert_eq!(dup.len(), 1);
        assert_eq!(dup[0].existing_flight_id, "N123AB_202107041000");

        // Same departure, other aircraft
        let none = find_duplicates(&store, &[flight("N9ZZ_202107041000", "N9ZZ", 0, 30)])
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_colliding_flight_ids_are_rejected() {
        let mut a = flight("N1A_202107041000", "N1A", 0, 2);
        let mut b = flight("N1A_202107041000", "N1A", 3, 9);
        a.segment_id = 0;
        b.segment_id = 1;
        assert!(check_unique_flight_ids(&[a, b]).is_err());
    }

    #[tokio::test]
    async fn test_stored_flight_id_collision_is_named() {
        let store = MemoryFlightStore::new();
        store
            .insert_batch(&ImportBatch {
                flights: vec![flight("N123AB_202107041000", "N123AB", 0, 5)],
                ..Default::default()
            })
            .await
            .unwrap();

        // 10:07 to 10:12 misses the stored window but floors to the same id
        let later = flight("N123AB_202107041000", "N123AB", 7, 12);
        assert!(find_duplicates(&store, &[later.clone()]).await.unwrap().is_empty());

        let err = check_stored_flight_ids(&store, &[later]).await.unwrap_err();
        match err.downcast_ref::<ImportError>() {
            Some(ImportError::FlightIdTaken {
                flight_id,
                existing_landing,
                ..
            }) => {
                assert_eq!(flight_id, "N123AB_202107041000");
                assert_eq!(existing_landing.format("%H:%M").to_string(), "10:05");
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!(
            check_stored_flight_ids(&store, &[flight("N123AB_202107041015", "N123AB", 20, 30)])
                .await
                .is_ok()
        );
    }

    #[test]
    fn test_summary_message() {
        let summary = ImportSummary {
            inserted: vec!["a".into(), "b".into()],
            ..ImportSummary::empty(Path::new("x.gpx"), Diagnostics::new())
        };
        assert_eq!(summary.message(), "2 flight tracks imported");
    }
}
