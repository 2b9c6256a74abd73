use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Elapsed-time sentinel for a point with no usable predecessor interval
pub const ELAPSED_OUTLIER: i64 = -1;
/// Heading sentinel for a point with no predecessor, distinct from a true north bearing
pub const HEADING_UNDEFINED: i32 = -1;

/// A position as produced by a format reader, before any normalization.
///
/// Every field is optional because readers coerce unparseable cells to
/// `None` rather than failing the whole file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPoint {
    pub registration: Option<String>,
    pub utc_datetime: Option<DateTime<Utc>>,
    pub local_datetime: Option<NaiveDateTime>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude_ft: Option<f64>,
    pub knots: Option<f64>,
    pub heading: Option<f64>,
    pub is_new_segment: bool,
}

impl RawPoint {
    pub fn has_position(&self) -> bool {
        matches!((self.latitude, self.longitude), (Some(lat), Some(lon))
            if lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon))
    }
}

/// Output of one reader for one file
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrack {
    pub format: &'static str,
    pub points: Vec<RawPoint>,
}

impl RawTrack {
    pub fn new(format: &'static str, points: Vec<RawPoint>) -> Self {
        Self { format, points }
    }

    /// Names of required fields that no point in the track carries
    pub fn missing_required(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.points.iter().any(|p| p.utc_datetime.is_some()) {
            missing.push("utc_datetime".to_string());
        }
        if !self.points.iter().any(|p| p.latitude.is_some()) {
            missing.push("latitude".to_string());
        }
        if !self.points.iter().any(|p| p.longitude.is_some()) {
            missing.push("longitude".to_string());
        }
        missing
    }
}

/// One normalized aircraft position.
///
/// `knots`, `heading`, `displacement_m` and `elapsed_seconds` are filled by
/// kinematics; `segment_id` is assigned by the segmenter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub registration: String,
    pub utc_datetime: DateTime<Utc>,
    pub local_datetime: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: Option<i32>,
    pub knots: Option<i32>,
    pub heading: Option<i32>,
    #[serde(default)]
    pub displacement_m: Option<f64>,
    #[serde(default)]
    pub elapsed_seconds: Option<i64>,
    #[serde(default)]
    pub segment_id: u32,
    #[serde(default)]
    pub is_new_segment: bool,
}

impl TrackPoint {
    pub fn new(
        utc_datetime: DateTime<Utc>,
        local_datetime: NaiveDateTime,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            registration: String::new(),
            utc_datetime,
            local_datetime,
            latitude,
            longitude,
            altitude_ft: None,
            knots: None,
            heading: None,
            displacement_m: None,
            elapsed_seconds: None,
            segment_id: 0,
            is_new_segment: false,
        }
    }
}
