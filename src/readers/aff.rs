use std::path::Path;

use super::TrackReader;
use super::coordinates::parse_coordinate;
use super::detector::{self, AFF_SIGNATURE, FormatSignature};
use super::table::{self, Table};
use crate::error::{ImportError, Result};
use crate::points::{RawPoint, RawTrack};
use crate::timestamps::{parse_naive, parse_utc};
use crate::units::parse_leading_number;

const LOCAL_TIME_COLUMNS: &[&str] = &[
    "posnAcquiredUTC -8",
    "posnAcquiredUTC (8)",
    "posnAcquiredUTC 0",
    "DateTime Local",
];

/// Automated flight following exports: one row per position report with
/// decimal coordinates and both UTC and local acquisition times
pub struct AffReader;

impl TrackReader for AffReader {
    fn format(&self) -> &'static str {
        "aff"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn signature(&self) -> Option<&FormatSignature> {
        Some(&AFF_SIGNATURE)
    }

    fn read(&self, path: &Path) -> Result<RawTrack> {
        let rows = table::load_rows(path)?;
        let header_row = detector::best_row_score(&rows, &AFF_SIGNATURE).1.unwrap_or(0);
        let table = Table::from_rows(rows, header_row)?;

        let utc = table.require(&["posnAcquiredUTC"])?;
        let lat = table.require(&["Latitude"])?;
        let lon = table.require(&["Longitude"])?;
        let local = table
            .column(LOCAL_TIME_COLUMNS)
            .or_else(|| table.column_with_prefix("posnAcquiredUTC", &["posnAcquiredUTC"]));
        let registration = table.column(&["Registration"]);
        let knots = table.column(&["Speed (kts)"]);
        let heading = table.column(&["Heading (True)"]);
        let altitude = table.column(&["Altitude (FT MSL)"]);

        let points: Vec<RawPoint> = table
            .data_rows()
            .map(|row| RawPoint {
                registration: Table::cell(row, registration).map(str::to_string),
                utc_datetime: Table::cell(row, Some(utc)).and_then(parse_utc),
                local_datetime: Table::cell(row, local).and_then(parse_naive),
                latitude: Table::cell(row, Some(lat)).and_then(parse_coordinate),
                longitude: Table::cell(row, Some(lon)).and_then(parse_coordinate),
                altitude_ft: Table::cell(row, altitude).and_then(parse_leading_number),
                knots: Table::cell(row, knots).and_then(parse_leading_number),
                heading: Table::cell(row, heading).and_then(parse_leading_number),
                is_new_segment: false,
            })
            .collect();

        if !points.is_empty() && points.iter().all(|p| p.utc_datetime.is_none()) {
            return Err(ImportError::UnparseableTimestamps {
                column: "posnAcquiredUTC".to_string(),
            });
        }

        Ok(RawTrack::new(self.format(), points))
    }
}
