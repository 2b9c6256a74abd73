//! GeoJSON exchange with the track editor.
//!
//! Exported points carry their ordinal in the formatted track so that an
//! edited document can be mapped back onto storage order, and the editor's
//! `is_new_segment` flags become manual splits on re-import.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{ImportParams, normalize_operator_code};
use crate::diagnostics::Diagnostics;
use crate::error::{ImportError, Result};
use crate::flights::SubmissionMethod;
use crate::points::TrackPoint;
use crate::registration::{Registration, RegistrationSource};
use crate::track_formatter::{FormattedTrack, TrackFormatter};

/// Per-track metadata the editor shows and may change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub registration: String,
    #[serde(default)]
    pub operator_code: Option<String>,
    #[serde(default)]
    pub aircraft_type: Option<String>,
    #[serde(default)]
    pub submission_method: SubmissionMethod,
    #[serde(default)]
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]` or `[longitude, latitude, altitude_ft]`
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointProperties {
    pub point_index: usize,
    pub min_index: usize,
    pub segment_id: u32,
    #[serde(default)]
    pub flight_id: Option<String>,
    pub registration: String,
    pub utc_datetime: DateTime<Utc>,
    pub local_datetime: NaiveDateTime,
    #[serde(default)]
    pub altitude_ft: Option<i32>,
    #[serde(default)]
    pub knots: Option<i32>,
    #[serde(default)]
    pub heading: Option<i32>,
    #[serde(default)]
    pub is_new_segment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: PointGeometry,
    pub properties: PointProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<PointFeature>,
}

/// The whole document handed to the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorDocument {
    pub track_info: TrackInfo,
    pub segments: BTreeMap<u32, FeatureCollection>,
}

impl PointFeature {
    fn from_point(point: &TrackPoint, point_index: usize, min_index: usize, flight_id: Option<&str>) -> Self {
        let mut coordinates = vec![point.longitude, point.latitude];
        if let Some(alt) = point.altitude_ft {
            coordinates.push(f64::from(alt));
        }
        Self {
            kind: "Feature".to_string(),
            geometry: PointGeometry {
                kind: "Point".to_string(),
                coordinates,
            },
            properties: PointProperties {
                point_index,
                min_index,
                segment_id: point.segment_id,
                flight_id: flight_id.map(str::to_string),
                registration: point.registration.clone(),
                utc_datetime: point.utc_datetime,
                local_datetime: point.local_datetime,
                altitude_ft: point.altitude_ft,
                knots: point.knots,
                heading: point.heading,
                is_new_segment: point.is_new_segment,
            },
        }
    }

    /// Position comes from the geometry, which the editor may have moved
    fn to_point(&self) -> Result<TrackPoint> {
        let (lon, lat) = match self.geometry.coordinates.as_slice() {
            [lon, lat, ..] => (*lon, *lat),
            _ => {
                return Err(ImportError::Malformed {
                    path: Default::default(),
                    message: format!(
                        "point {} has fewer than two coordinates",
                        self.properties.point_index
                    ),
                });
            }
        };
        let props = &self.properties;
        let mut p = TrackPoint::new(props.utc_datetime, props.local_datetime, lat, lon);
        p.registration = props.registration.clone();
        p.altitude_ft = props.altitude_ft;
        p.knots = props.knots;
        p.heading = props.heading;
        p.segment_id = props.segment_id;
        p.is_new_segment = props.is_new_segment;
        Ok(p)
    }
}

/// Build the editor document for a formatted track
pub fn export_segments(track: &FormattedTrack) -> EditorDocument {
    let flight_ids: BTreeMap<u32, &str> = track
        .flights
        .iter()
        .map(|f| (f.segment_id, f.flight_id.as_str()))
        .collect();
    let first = track.flights.first();

    let mut segments: BTreeMap<u32, FeatureCollection> = BTreeMap::new();
    let mut min_index: BTreeMap<u32, usize> = BTreeMap::new();
    for (i, point) in track.points.iter().enumerate() {
        let min = *min_index.entry(point.segment_id).or_insert(i);
        segments
            .entry(point.segment_id)
            .or_insert_with(|| FeatureCollection {
                kind: "FeatureCollection".to_string(),
                features: Vec::new(),
            })
            .features
            .push(PointFeature::from_point(
                point,
                i,
                min,
                flight_ids.get(&point.segment_id).copied(),
            ));
    }

    EditorDocument {
        track_info: TrackInfo {
            registration: track.registration.as_str().to_string(),
            operator_code: first.and_then(|f| f.operator_code.clone()),
            aircraft_type: first.and_then(|f| f.aircraft_type.clone()),
            submission_method: first.map(|f| f.submission_method).unwrap_or_default(),
            source_file: Some(track.source.display().to_string()),
        },
        segments,
    }
}

/// Points of the edited collections in their original order
pub fn edited_points(collections: &[FeatureCollection]) -> Result<Vec<TrackPoint>> {
    let mut features: Vec<&PointFeature> = collections.iter().flat_map(|c| c.features.iter()).collect();
    features.sort_by_key(|f| f.properties.point_index);
    features.into_iter().map(PointFeature::to_point).collect()
}

/// Re-run segmentation, noise removal and stamping over an edited track.
/// `track_info` overrides the registration and submission metadata.
pub fn reimport(
    formatter: &TrackFormatter,
    source: &Path,
    track_info: &TrackInfo,
    collections: &[FeatureCollection],
    params: &ImportParams,
) -> Result<FormattedTrack> {
    let mut diagnostics = Diagnostics::new();
    let mut points = edited_points(collections).map_err(|e| match e {
        ImportError::Malformed { message, .. } => ImportError::Malformed {
            path: source.to_path_buf(),
            message,
        },
        other => other,
    })?;
    if points.is_empty() {
        return Err(ImportError::NoFlightSegments(source.to_path_buf()));
    }
    // Moved or deleted points change every neighbour's motion
    for p in &mut points {
        p.knots = None;
        p.heading = None;
    }

    let registration = Registration::from_stored(track_info.registration.trim())?;
    let operator_code = normalize_operator_code(
        track_info
            .operator_code
            .as_deref()
            .or(params.operator_code.as_deref()),
    )?;

    let mut params = params.clone();
    params.submission_method = track_info.submission_method;
    if track_info.aircraft_type.is_some() {
        params.aircraft_type = track_info.aircraft_type.clone();
    }

    let manual_splits = points.iter().filter(|p| p.is_new_segment).count();
    if manual_splits > 0 {
        diagnostics.info(format!("{manual_splits} manual split(s) applied from the editor"));
    }

    formatter.finish(
        source,
        "editor",
        points,
        registration,
        RegistrationSource::Caller,
        &params,
        operator_code,
        diagnostics,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{ConversionResult, TrackConverter};
    use crate::readers::ReaderRegistry;
    use std::sync::Arc;

    struct NoConverter;
    impl TrackConverter for NoConverter {
        fn convert_to_gpx(&self, _input: &Path, _output: &Path) -> ConversionResult {
            ConversionResult::failed("not available")
        }
    }

    fn formatter() -> TrackFormatter {
        TrackFormatter::new(
            ReaderRegistry::standard(Arc::new(NoConverter)),
            chrono_tz::US::Alaska,
        )
    }

    fn write_track(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("N123AB.csv");
        std::fs::write(
            &path,
            "utc_datetime,latitude,longitude,altitude_ft\n\
             2021-07-04 18:00:00,63.00,-151.0,1000\n\
             2021-07-04 18:05:00,63.05,-151.0,1500\n\
             2021-07-04 18:10:00,63.10,-151.0,1500\n\
             2021-07-04 18:50:00,63.50,-151.0,2000\n\
             2021-07-04 18:55:00,63.55,-151.0,2000\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_export_keys_segments_and_keeps_indices() {
        let dir = tempfile::tempdir().unwrap();
        let track = formatter()
            .format_track(&write_track(dir.path()), &ImportParams::default())
            .unwrap();
        let doc = export_segments(&track);

        assert_eq!(doc.segments.len(), 2);
        let second = &doc.segments[&1];
        assert_eq!(second.features[0].properties.point_index, 3);
        assert!(second.features.iter().all(|f| f.properties.min_index == 3));
        assert_eq!(
            second.features[0].properties.flight_id.as_deref(),
            Some("N123AB_202107041045")
        );

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["segments"]["0"]["type"], "FeatureCollection");
        assert_eq!(json["track_info"]["registration"], "N123AB");
    }

    #[test]
    fn test_reimport_applies_manual_split_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_track(dir.path());
        let f = formatter();
        let track = f.format_track(&path, &ImportParams::default()).unwrap();
        let mut doc = export_segments(&track);

        // Split the first flight at its third point
        doc.segments.get_mut(&0).unwrap().features[2].properties.is_new_segment = true;
        doc.track_info.registration = "N77XY".into();
        doc.track_info.operator_code = Some("k2a".into());

        let collections: Vec<FeatureCollection> = doc.segments.values().cloned().collect();
        let edited = reimport(&f, &path, &doc.track_info, &collections, &ImportParams::default()).unwrap();

        assert_eq!(edited.flights.len(), 3);
        assert!(edited.flights.iter().all(|fl| fl.registration == "N77XY"));
        assert_eq!(edited.flights[0].operator_code.as_deref(), Some("K2A"));
        assert_eq!(edited.format, "editor");
    }

    #[test]
    fn test_reimport_derives_motion_from_moved_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_track(dir.path());
        let f = formatter();
        let track = f.format_track(&path, &ImportParams::default()).unwrap();
        assert_eq!(track.points[1].heading, Some(0));
        let mut doc = export_segments(&track);

        // Drag the second fix due east of the first
        let moved = &mut doc.segments.get_mut(&0).unwrap().features[1];
        moved.geometry.coordinates = vec![-150.9, 63.0];

        let collections: Vec<FeatureCollection> = doc.segments.values().cloned().collect();
        let edited = reimport(&f, &path, &doc.track_info, &collections, &ImportParams::default()).unwrap();

        let heading = edited.points[1].heading.unwrap();
        assert!((85..=95).contains(&heading), "{heading}");
        // ~5 km in five minutes
        let knots = edited.points[1].knots.unwrap();
        assert!((30..=35).contains(&knots), "{knots}");
        assert_ne!(edited.points[1].knots, track.points[1].knots);
    }

    #[test]
    fn test_edited_points_sorted_by_point_index() {
        let dir = tempfile::tempdir().unwrap();
        let track = formatter()
            .format_track(&write_track(dir.path()), &ImportParams::default())
            .unwrap();
        let doc = export_segments(&track);
        let mut collections: Vec<FeatureCollection> = doc.segments.values().cloned().collect();
        collections.reverse();

        let points = edited_points(&collections).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[0].latitude, 63.0);
        assert_eq!(points[4].latitude, 63.55);
    }
}
