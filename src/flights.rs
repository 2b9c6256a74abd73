use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use postgis_diesel::types::{LineString, PointZ};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::points::TrackPoint;
use crate::segmenter::SegmentSummary;

pub const WGS84_SRID: u32 = 4326;

/// How a track reached the importer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::SubmissionMethod")]
#[serde(rename_all = "snake_case")]
pub enum SubmissionMethod {
    #[default]
    #[db_enum(rename = "manual")]
    Manual,
    #[db_enum(rename = "survey123")]
    Survey123,
    #[db_enum(rename = "legacy")]
    Legacy,
    #[db_enum(rename = "other")]
    Other,
}

impl fmt::Display for SubmissionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionMethod::Manual => write!(f, "manual"),
            SubmissionMethod::Survey123 => write!(f, "survey123"),
            SubmissionMethod::Legacy => write!(f, "legacy"),
            SubmissionMethod::Other => write!(f, "other"),
        }
    }
}

impl FromStr for SubmissionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" | "" => Ok(SubmissionMethod::Manual),
            "survey123" => Ok(SubmissionMethod::Survey123),
            "legacy" => Ok(SubmissionMethod::Legacy),
            "other" => Ok(SubmissionMethod::Other),
            other => Err(format!(
                "unknown submission method '{other}' (expected manual, survey123, legacy or other)"
            )),
        }
    }
}

/// One discrete flight derived from a contiguous run of track points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    /// `<REGISTRATION>_<YYYYMMDDHHMM>` of the floored departure
    pub flight_id: String,

    /// Segment number within the source file
    pub segment_id: u32,

    pub registration: String,

    /// Earliest local time in the segment
    pub departure_datetime: NaiveDateTime,

    /// Latest local time in the segment
    pub landing_datetime: NaiveDateTime,

    pub duration_hrs: f64,

    /// Three character operator code
    pub operator_code: Option<String>,

    pub aircraft_type: Option<String>,

    pub submission_method: SubmissionMethod,

    /// When the track was ingested
    pub submission_time: DateTime<Utc>,

    /// Login of whoever ran the import
    pub submitted_by: Option<String>,

    /// Archive path of the source file once archived
    pub source_file: Option<String>,
}

impl FlightSegment {
    pub fn from_summary(summary: &SegmentSummary, submission_time: DateTime<Utc>) -> Self {
        Self {
            flight_id: summary.flight_id.clone(),
            segment_id: summary.segment_id,
            registration: summary.registration.clone(),
            departure_datetime: summary.departure_datetime,
            landing_datetime: summary.landing_datetime,
            duration_hrs: summary.duration_hrs(),
            operator_code: None,
            aircraft_type: None,
            submission_method: SubmissionMethod::default(),
            submission_time,
            submitted_by: None,
            source_file: None,
        }
    }

    /// Whether two flights of the same aircraft share any instant
    pub fn overlaps(&self, registration: &str, departure: NaiveDateTime, landing: NaiveDateTime) -> bool {
        self.registration == registration
            && self.departure_datetime <= landing
            && departure <= self.landing_datetime
    }
}

/// A flight already present in the store, as needed for duplicate checks
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::flights)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StoredFlight {
    pub id: i32,
    pub flight_id: String,
    pub registration: String,
    pub departure_datetime: NaiveDateTime,
    pub landing_datetime: NaiveDateTime,
}

/// Insert row for the flights table
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::flights)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewFlightRow {
    pub flight_id: String,
    pub registration: String,
    pub departure_datetime: NaiveDateTime,
    pub landing_datetime: NaiveDateTime,
    pub duration_hrs: f64,
    pub operator_code: Option<String>,
    pub aircraft_type: Option<String>,
    pub submission_method: SubmissionMethod,
    pub submission_time: DateTime<Utc>,
    pub submitted_by: Option<String>,
    pub source_file: Option<String>,
}

impl From<&FlightSegment> for NewFlightRow {
    fn from(f: &FlightSegment) -> Self {
        Self {
            flight_id: f.flight_id.clone(),
            registration: f.registration.clone(),
            departure_datetime: f.departure_datetime,
            landing_datetime: f.landing_datetime,
            duration_hrs: f.duration_hrs,
            operator_code: f.operator_code.clone(),
            aircraft_type: f.aircraft_type.clone(),
            submission_method: f.submission_method,
            submission_time: f.submission_time,
            submitted_by: f.submitted_by.clone(),
            source_file: f.source_file.clone(),
        }
    }
}

/// A retained point waiting for its flight's numeric key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub flight_id: String,
    pub point_index: i32,
    pub utc_datetime: DateTime<Utc>,
    pub local_datetime: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: Option<i32>,
    pub knots: Option<i32>,
    pub heading: Option<i32>,
}

impl PointRecord {
    pub fn from_point(flight_id: &str, point_index: usize, p: &TrackPoint) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            point_index: i32::try_from(point_index).unwrap_or(i32::MAX),
            utc_datetime: p.utc_datetime,
            local_datetime: p.local_datetime,
            latitude: p.latitude,
            longitude: p.longitude,
            altitude_ft: p.altitude_ft,
            knots: p.knots,
            heading: p.heading,
        }
    }

    /// Z is altitude in feet, zero when unknown
    pub fn geometry(&self) -> PointZ {
        PointZ {
            x: self.longitude,
            y: self.latitude,
            z: f64::from(self.altitude_ft.unwrap_or(0)),
            srid: Some(WGS84_SRID),
        }
    }
}

/// Ordered path of one flight
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub flight_id: String,
    pub vertices: Vec<PointZ>,
}

impl LineRecord {
    /// Build from the flight's points, which must already be in ascending time order
    pub fn from_points<'a>(flight_id: &str, points: impl IntoIterator<Item = &'a PointRecord>) -> Self {
        Self {
            flight_id: flight_id.to_string(),
            vertices: points.into_iter().map(PointRecord::geometry).collect(),
        }
    }

    pub fn geometry(&self) -> LineString<PointZ> {
        LineString {
            points: self.vertices.clone(),
            srid: Some(WGS84_SRID),
        }
    }
}

/// Insert row for flight_points, keyed by the flight's numeric id
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::flight_points)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewPointRow {
    pub flight_id: i32,
    pub point_index: i32,
    pub utc_datetime: DateTime<Utc>,
    pub local_datetime: NaiveDateTime,
    pub altitude_ft: Option<i32>,
    pub knots: Option<i32>,
    pub heading: Option<i32>,
    pub geom: PointZ,
}

impl NewPointRow {
    pub fn new(flight_key: i32, p: &PointRecord) -> Self {
        Self {
            flight_id: flight_key,
            point_index: p.point_index,
            utc_datetime: p.utc_datetime,
            local_datetime: p.local_datetime,
            altitude_ft: p.altitude_ft,
            knots: p.knots,
            heading: p.heading,
            geom: p.geometry(),
        }
    }
}

/// Insert row for flight_lines
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::flight_lines)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewLineRow {
    pub flight_id: i32,
    pub geom: LineString<PointZ>,
}

impl NewLineRow {
    pub fn new(flight_key: i32, line: &LineRecord) -> Self {
        Self {
            flight_id: flight_key,
            geom: line.geometry(),
        }
    }
}

/// Everything one file contributes to storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportBatch {
    pub flights: Vec<FlightSegment>,
    pub points: Vec<PointRecord>,
    pub lines: Vec<LineRecord>,
}

impl ImportBatch {
    /// Build the three row sets from formatted points. Segments whose duration
    /// is not positive are left out along with their points.
    pub fn build(flights: &[FlightSegment], points: &[TrackPoint]) -> Self {
        let kept: Vec<FlightSegment> = flights
            .iter()
            .filter(|f| f.duration_hrs > 0.0)
            .cloned()
            .collect();

        let mut point_records = Vec::new();
        let mut lines = Vec::new();
        for flight in &kept {
            let start = point_records.len();
            point_records.extend(
                points
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.segment_id == flight.segment_id)
                    .map(|(i, p)| PointRecord::from_point(&flight.flight_id, i, p)),
            );
            lines.push(LineRecord::from_points(&flight.flight_id, &point_records[start..]));
        }

        Self {
            flights: kept,
            points: point_records,
            lines,
        }
    }

    /// Keep only the flights whose ids are in `flight_ids`, with their points and lines
    pub fn retain_flights(&mut self, flight_ids: &[String]) {
        self.flights.retain(|f| flight_ids.contains(&f.flight_id));
        self.points.retain(|p| flight_ids.contains(&p.flight_id));
        self.lines.retain(|l| flight_ids.contains(&l.flight_id));
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}
