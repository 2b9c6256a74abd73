use std::path::Path;

use super::TrackReader;
use super::coordinates::{Hemisphere, parse_packed_ddm};
use super::detector::{self, FormatSignature, TMS_SIGNATURE};
use super::table::{self, Table};
use crate::error::{ImportError, Result};
use crate::points::{RawPoint, RawTrack};
use crate::timestamps::parse_utc;
use crate::units::{meters_to_feet, parse_leading_number};

const LONGITUDE_COLUMNS: &[&str] = &[
    "Longititude",
    "Longitude",
    "Longitude (DDMM.MMMM)",
    "Longititude (DDMM.MMMM)",
];
const LATITUDE_COLUMNS: &[&str] = &["Latitude", "Latitude (DDMM.MMMM)"];

/// TMS tracker logs. Coordinates are packed degrees and decimal minutes with
/// separate hemisphere columns, altitude is in meters, and header names are
/// padded with spaces.
pub struct TmsReader;

impl TrackReader for TmsReader {
    fn format(&self) -> &'static str {
        "tms"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn signature(&self) -> Option<&FormatSignature> {
        Some(&TMS_SIGNATURE)
    }

    fn read(&self, path: &Path) -> Result<RawTrack> {
        let rows = table::load_rows(path)?;
        let header_row = detector::best_row_score(&rows, &TMS_SIGNATURE).1.unwrap_or(0);
        let table = Table::from_rows(rows, header_row)?;

        let utc = table.require(&["UTC"])?;
        let lat = table.require(LATITUDE_COLUMNS)?;
        let lon = table.require(LONGITUDE_COLUMNS)?;
        let hem_ns = table.column(&["HemNS"]);
        let hem_ew = table.column(&["HemEW"]);
        let knots = table.column(&["Knots"]);
        let heading = table.column(&["Heading"]);
        let altitude_m = table.column(&["Altitude (m)"]);

        let points: Vec<RawPoint> = table
            .data_rows()
            .map(|row| {
                // Missing hemispheres default to the north-west quadrant the logs are recorded in
                let ns = Table::cell(row, hem_ns)
                    .and_then(Hemisphere::parse)
                    .unwrap_or(Hemisphere::North);
                let ew = Table::cell(row, hem_ew)
                    .and_then(Hemisphere::parse)
                    .unwrap_or(Hemisphere::West);
                RawPoint {
                    registration: None,
                    utc_datetime: Table::cell(row, Some(utc)).and_then(parse_utc),
                    local_datetime: None,
                    latitude: Table::cell(row, Some(lat)).and_then(|v| parse_packed_ddm(v, Some(ns))),
                    longitude: Table::cell(row, Some(lon)).and_then(|v| parse_packed_ddm(v, Some(ew))),
                    altitude_ft: Table::cell(row, altitude_m)
                        .and_then(parse_leading_number)
                        .map(meters_to_feet),
                    knots: Table::cell(row, knots).and_then(parse_leading_number),
                    heading: Table::cell(row, heading).and_then(parse_leading_number),
                    is_new_segment: false,
                }
            })
            .collect();

        if !points.is_empty() && points.iter().all(|p| p.utc_datetime.is_none()) {
            return Err(ImportError::UnparseableTimestamps {
                column: "UTC".to_string(),
            });
        }

        Ok(RawTrack::new(self.format(), points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_packed_coordinates_and_meters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("N44TM.csv");
        std::fs::write(
            &path,
            "Serial No., UTC, Latitude, HemNS, Longititude, HemEW, Knots, Heading, Altitude (m), HDOP, New Conn, Entered, Event
1234,2019-06-01 18:00:00,6130.0000,N,15015.0000,W,88,45,1000,0.9,0,0,
",
        )
        .unwrap();

        let track = TmsReader.read(&path).unwrap();
        let p = &track.points[0];
        assert!((p.latitude.unwrap() - 61.5).abs() < 1e-9);
        assert!((p.longitude.unwrap() + 150.25).abs() < 1e-9);
        assert!((p.altitude_ft.unwrap() - 3280.8399).abs() < 1e-6);
        assert_eq!(p.knots, Some(88.0));
        assert!(p.registration.is_none());
    }
}
