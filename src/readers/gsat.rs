use std::path::Path;
use tracing::warn;

use super::TrackReader;
use super::coordinates::parse_dms_pair;
use super::detector::{self, FormatSignature, GSAT_SIGNATURE};
use super::table::{self, Table};
use crate::error::{ImportError, Result};
use crate::points::{RawPoint, RawTrack};
use crate::timestamps::parse_utc;
use crate::units::parse_leading_number;

/// Rows between the metadata header and the position header in a GSAT export
const POSITION_HEADER_OFFSET: usize = 5;
/// The asset name is on the third data row under the metadata header
const ASSET_ROW: usize = 2;

/// GSAT exports: an asset metadata block followed by a position table whose
/// coordinates are a single DMS pair and whose numbers carry unit suffixes
pub struct GsatReader;

impl GsatReader {
    fn registration(rows: &[Vec<String>], metadata_row: usize) -> Option<String> {
        let asset_column = rows
            .get(metadata_row)?
            .iter()
            .position(|c| c.trim() == "Asset")?;
        let asset = rows
            .get(metadata_row + 1 + ASSET_ROW)?
            .get(asset_column)?
            .trim();
        if asset.is_empty() {
            None
        } else {
            Some(format!("N{}", asset.trim_start_matches(['N', 'n'])))
        }
    }

    fn position_header_row(rows: &[Vec<String>], metadata_row: usize) -> usize {
        rows.iter()
            .enumerate()
            .skip(metadata_row + 1)
            .find(|(_, row)| row.iter().any(|c| c.trim() == "Lat/Lng"))
            .map(|(i, _)| i)
            .unwrap_or(metadata_row + POSITION_HEADER_OFFSET)
    }
}

impl TrackReader for GsatReader {
    fn format(&self) -> &'static str {
        "gsat"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn signature(&self) -> Option<&FormatSignature> {
        Some(&GSAT_SIGNATURE)
    }

    fn read(&self, path: &Path) -> Result<RawTrack> {
        let rows = table::load_rows(path)?;
        let metadata_row = detector::best_row_score(&rows, &GSAT_SIGNATURE).1.unwrap_or(0);

        let registration = Self::registration(&rows, metadata_row);
        if registration.is_none() {
            warn!("No asset registration found in GSAT metadata of {:?}", path);
        }

        let header_row = Self::position_header_row(&rows, metadata_row);
        let table = Table::from_rows(rows, header_row)?;
        let lat_lng = table.require(&["Lat/Lng"])?;
        let date = table.require(&["Date"])?;
        let speed = table.column(&["Speed"]);
        let heading = table.column(&["Heading"]);
        let altitude = table.column(&["Altitude"]);

        let points: Vec<RawPoint> = table
            .data_rows()
            .map(|row| {
                let position = Table::cell(row, Some(lat_lng)).and_then(parse_dms_pair);
                RawPoint {
                    registration: registration.clone(),
                    utc_datetime: Table::cell(row, Some(date)).and_then(parse_utc),
                    local_datetime: None,
                    latitude: position.map(|(lat, _)| lat),
                    longitude: position.map(|(_, lon)| lon),
                    altitude_ft: Table::cell(row, altitude).and_then(parse_leading_number),
                    knots: Table::cell(row, speed).and_then(parse_leading_number),
                    heading: Table::cell(row, heading).and_then(parse_leading_number),
                    is_new_segment: false,
                }
            })
            .collect();

        if !points.is_empty() && points.iter().all(|p| p.utc_datetime.is_none()) {
            return Err(ImportError::UnparseableTimestamps {
                column: "Date".to_string(),
            });
        }

        Ok(RawTrack::new(self.format(), points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Asset,IMEI/Unit #/Device ID,Device,Positions,Events,Messages,Alerts
Summary,,,,,,
,,,,,,
709M,300434060000000,GSE,120,3,0,0
,,,,,,
Date,Lat/Lng,Speed,Heading,Altitude,Event
2019-06-01 18:00:00,62°37'21.9600\"N 150°44'42.0000\"W,95 knots,271°,4500 ft,Position
2019-06-01 18:02:00,62°38'00.0000\"N 150°46'00.0000\"W,97 knots,272°,4600 ft,Position
";

    #[test]
    fn test_reads_gsat_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gsat.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let track = GsatReader.read(&path).unwrap();
        assert_eq!(track.points.len(), 2);
        let p = &track.points[0];
        assert_eq!(p.registration.as_deref(), Some("N709M"));
        assert!((p.latitude.unwrap() - 62.6228).abs() < 1e-3);
        assert!((p.longitude.unwrap() + 150.745).abs() < 1e-3);
        assert_eq!(p.knots, Some(95.0));
        assert_eq!(p.heading, Some(271.0));
        assert_eq!(p.altitude_ft, Some(4500.0));
        assert!(p.utc_datetime.is_some());
    }

    #[test]
    fn test_missing_position_header_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gsat.csv");
        std::fs::write(&path, "Asset,Device\n709M,GSE\n").unwrap();
        assert!(GsatReader.read(&path).is_err());
    }
}
