//! Turns one track file into normalized, segmented points and the flights
//! they describe.
//!
//! Each stage is a plain function from one point collection to the next so the
//! editor re-import path can re-enter the pipeline after the read stage.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ImportParams;
use crate::diagnostics::Diagnostics;
use crate::error::{ImportError, Result};
use crate::flights::FlightSegment;
use crate::kinematics::{self, AlbersEqualArea};
use crate::points::{RawPoint, TrackPoint};
use crate::readers::ReaderRegistry;
use crate::registration::{self, Registration, RegistrationSource};
use crate::segmenter;
use crate::timestamps::to_local;

/// Everything the importer needs from one source file
#[derive(Debug, Clone)]
pub struct FormattedTrack {
    pub source: PathBuf,
    /// Reader that produced the points, or "editor" for re-imported edits
    pub format: &'static str,
    pub registration: Registration,
    pub registration_source: RegistrationSource,
    pub points: Vec<TrackPoint>,
    pub flights: Vec<FlightSegment>,
    pub diagnostics: Diagnostics,
}

/// Convert reader output to typed points, filling local time from `tz` where
/// the source had no local column. Points without a UTC time or a valid
/// position are dropped.
pub fn localize(raw: Vec<RawPoint>, tz: Tz, diagnostics: &mut Diagnostics) -> Vec<TrackPoint> {
    let total = raw.len();
    let points: Vec<TrackPoint> = raw
        .into_iter()
        .filter(RawPoint::has_position)
        .filter_map(|r| {
            let utc = r.utc_datetime?;
            let mut p = TrackPoint::new(
                utc,
                r.local_datetime.unwrap_or_else(|| to_local(utc, tz)),
                r.latitude?,
                r.longitude?,
            );
            p.altitude_ft = r.altitude_ft.filter(|a| a.is_finite()).map(|a| a.round() as i32);
            p.knots = r.knots.filter(|k| k.is_finite()).map(|k| k.round().max(0.0) as i32);
            p.heading = r
                .heading
                .filter(|h| h.is_finite())
                .map(|h| (h.round() as i32).rem_euclid(360));
            p.is_new_segment = r.is_new_segment;
            Some(p)
        })
        .collect();

    let dropped = total - points.len();
    if dropped > 0 {
        diagnostics.warn(format!(
            "{dropped} of {total} points had no parseable time or position and were dropped"
        ));
    }
    points
}

/// Sort ascending by local time and keep only the first point of each run of
/// identical instants. Duplicates are matched on UTC, so the two readings of
/// a wall-clock time in the fall-back hour both survive. A manual split on a
/// dropped duplicate carries over to the point that is kept.
pub fn sort_and_dedupe(mut points: Vec<TrackPoint>) -> Vec<TrackPoint> {
    points.sort_by_key(|p| (p.local_datetime, p.utc_datetime));
    let mut kept: Vec<TrackPoint> = Vec::with_capacity(points.len());
    for p in points {
        match kept.last_mut() {
            Some(last) if last.utc_datetime == p.utc_datetime => {
                last.is_new_segment |= p.is_new_segment;
            }
            _ => kept.push(p),
        }
    }
    kept
}

/// Drop stationary jitter: points closer than `min_distance_m` to their
/// predecessor that were also recorded at the same instant
pub fn remove_noise(points: Vec<TrackPoint>, min_distance_m: f64) -> Vec<TrackPoint> {
    points
        .into_iter()
        .filter(|p| {
            let is_noise = matches!(
                (p.displacement_m, p.elapsed_seconds),
                (Some(d), Some(0)) if d < min_distance_m
            );
            !is_noise
        })
        .collect()
}

pub fn apply_registration(points: &mut [TrackPoint], registration: &Registration) {
    for p in points {
        p.registration = registration.as_str().to_string();
    }
}

/// Summarize segments into flights carrying the caller's submission metadata
pub fn build_flights(
    points: &[TrackPoint],
    params: &ImportParams,
    operator_code: Option<String>,
    submission_time: DateTime<Utc>,
) -> Vec<FlightSegment> {
    segmenter::summarize(points, params.seg_time_diff)
        .iter()
        .map(|summary| {
            let mut flight = FlightSegment::from_summary(summary, submission_time);
            flight.operator_code = operator_code.clone();
            flight.aircraft_type = params.aircraft_type.clone();
            flight.submission_method = params.submission_method;
            flight.submitted_by = params.submitted_by.clone();
            flight
        })
        .collect()
}

pub struct TrackFormatter {
    registry: ReaderRegistry,
    tz: Tz,
    projection: AlbersEqualArea,
}

impl TrackFormatter {
    pub fn new(registry: ReaderRegistry, tz: Tz) -> Self {
        Self {
            registry,
            tz,
            projection: AlbersEqualArea::alaska(),
        }
    }

    pub fn registry(&self) -> &ReaderRegistry {
        &self.registry
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Read, normalize and segment one track file
    pub fn format_track(&self, path: &Path, params: &ImportParams) -> Result<FormattedTrack> {
        let operator_code = params.normalized_operator_code()?;
        let mut diagnostics = Diagnostics::new();

        let raw = self.registry.read(path)?;
        info!("Read {} points from {:?} as {}", raw.points.len(), path, raw.format);

        let column_values: Vec<String> = raw
            .points
            .iter()
            .filter_map(|p| p.registration.clone())
            .collect();
        let column_refs: Vec<&str> = column_values.iter().map(String::as_str).collect();

        let points = localize(raw.points, self.tz, &mut diagnostics);
        let points = sort_and_dedupe(points);

        let (registration, source) =
            registration::resolve(&column_refs, params.registration.as_deref(), path)?;
        match source {
            RegistrationSource::Synthesized => diagnostics.warn(format!(
                "No registration could be found for {}; the placeholder {} was used instead",
                path.display(),
                registration
            )),
            RegistrationSource::Filename => diagnostics.info(format!(
                "Registration {} taken from the file name {}",
                registration,
                path.display()
            )),
            _ => {}
        }

        self.finish(
            path,
            raw.format,
            points,
            registration,
            source,
            params,
            operator_code,
            diagnostics,
        )
    }

    /// Run kinematics, segmentation, noise removal and stamping over points
    /// that are already localized and ordered
    #[allow(clippy::too_many_arguments)]
    pub fn finish(
        &self,
        path: &Path,
        format: &'static str,
        mut points: Vec<TrackPoint>,
        registration: Registration,
        registration_source: RegistrationSource,
        params: &ImportParams,
        operator_code: Option<String>,
        diagnostics: Diagnostics,
    ) -> Result<FormattedTrack> {
        apply_registration(&mut points, &registration);

        let points = kinematics::derive(points, params.seg_time_diff, &self.projection);
        let points = segmenter::assign_segments(points, params.seg_time_diff);

        let before = points.len();
        let points = remove_noise(points, params.min_point_distance);
        if points.len() < before {
            debug!("Removed {} stationary points from {:?}", before - points.len(), path);
        }

        let flights = build_flights(&points, params, operator_code, Utc::now());
        if flights.is_empty() {
            return Err(ImportError::NoFlightSegments(path.to_path_buf()));
        }
        info!(
            "{:?}: {} points in {} segment(s) for {}",
            path,
            points.len(),
            flights.len(),
            registration
        );

        Ok(FormattedTrack {
            source: path.to_path_buf(),
            format,
            registration,
            registration_source,
            points,
            flights,
            diagnostics,
        })
    }
}
