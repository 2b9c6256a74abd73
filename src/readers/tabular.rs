use std::path::Path;

use super::TrackReader;
use super::coordinates::parse_coordinate;
use super::detector::{self, FormatSignature, TABULAR_SIGNATURE};
use super::table::{self, Table};
use crate::error::{ImportError, Result};
use crate::points::{RawPoint, RawTrack};
use crate::timestamps::{parse_naive, parse_utc};
use crate::units::parse_leading_number;

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "y"
    )
}

/// Spreadsheet exports that already use the normalized column names, including
/// tracks saved back out of the track editor
pub struct TabularReader;

impl TrackReader for TabularReader {
    fn format(&self) -> &'static str {
        "tabular"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv", "tsv", "txt"]
    }

    fn signature(&self) -> Option<&FormatSignature> {
        Some(&TABULAR_SIGNATURE)
    }

    fn read(&self, path: &Path) -> Result<RawTrack> {
        let rows = table::load_rows(path)?;
        let header_row = detector::best_row_score(&rows, &TABULAR_SIGNATURE).1.unwrap_or(0);
        let mut table = Table::from_rows(rows, header_row)?;
        for name in table.header.iter_mut() {
            *name = name.to_ascii_lowercase();
        }

        let utc = table.require(&["utc_datetime", "utc_time", "utc"])?;
        let lat = table.require(&["latitude", "lat"])?;
        let lon = table.require(&["longitude", "lon", "lng"])?;
        let local = table.column(&["local_datetime", "ak_datetime", "local_time"]);
        let registration = table.column(&["registration", "tail_number"]);
        let altitude = table.column(&["altitude_ft", "altitude"]);
        let knots = table.column(&["knots", "speed_knots"]);
        let heading = table.column(&["heading", "bearing"]);
        let split = table.column(&["is_new_segment"]);

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
                is_new_segment: Table::cell(row, split).map(parse_flag).unwrap_or(false),
            })
            .collect();

        if !points.is_empty() && points.iter().all(|p| p.utc_datetime.is_none()) {
            return Err(ImportError::UnparseableTimestamps {
                column: table.header[utc].clone(),
            });
        }

        Ok(RawTrack::new(self.format(), points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_canonical_columns_and_split_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.tsv");
        std::fs::write(
            &path,
            "registration\tutc_datetime\tlatitude\tlongitude\taltitude_ft\tis_new_segment
N123AB\t2019-06-01T18:00:00Z\t63.1\t-151.2\t3000\tfalse
N123AB\t2019-06-01T18:05:00Z\t63.2\t-151.3\t3100\ttrue
",
        )
        .unwrap();

        let track = TabularReader.read(&path).unwrap();
        assert_eq!(track.points.len(), 2);
        assert!(!track.points[0].is_new_segment);
        assert!(track.points[1].is_new_segment);
        assert_eq!(track.points[1].altitude_ft, Some(3100.0));
    }

    #[test]
    fn test_entirely_unparseable_timestamps_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "utc_datetime,latitude,longitude\nsoon,1,2\nlater,1,2\n").unwrap();
        assert!(matches!(
            TabularReader.read(&path),
            Err(ImportError::UnparseableTimestamps { .. })
        ));
    }
}
