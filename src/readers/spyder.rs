use std::path::Path;

use super::TrackReader;
use super::coordinates::{Hemisphere, dms_to_dd, parse_coordinate};
use super::detector::{self, FormatSignature, SPY_SIGNATURE};
use super::table::{self, Table};
use crate::error::{ImportError, Result};
use crate::points::{RawPoint, RawTrack};
use crate::timestamps::{parse_naive, parse_utc};
use crate::units::{mph_to_knots, parse_leading_number};

#[derive(Debug, Clone, Copy)]
enum SpeedColumn {
    Knots(usize),
    Mph(usize),
}

/// Columns for one axis: the decimal column when present, otherwise the
/// degrees/minutes/seconds triple, otherwise the free-form column
#[derive(Debug, Clone, Copy)]
struct AxisColumns {
    decimal: Option<usize>,
    degrees: Option<usize>,
    minutes: Option<usize>,
    seconds: Option<usize>,
    plain: Option<usize>,
}

impl AxisColumns {
    fn find(table: &Table, axis: &str) -> Self {
        let part = |suffix: &str| {
            let name = format!("{axis}({suffix})");
            table.column(&[name.as_str()])
        };
        Self {
            decimal: part("decimal"),
            degrees: part("degrees"),
            minutes: part("minutes"),
            seconds: part("seconds"),
            plain: table.column(&[axis]),
        }
    }

    fn is_empty(&self) -> bool {
        self.decimal.is_none() && self.degrees.is_none() && self.plain.is_none()
    }

    fn value(&self, row: &[String], negative: Hemisphere) -> Option<f64> {
        if let Some(v) = Table::cell(row, self.decimal).and_then(|c| c.parse::<f64>().ok()) {
            return Some(v);
        }
        if let Some(degrees) = Table::cell(row, self.degrees).and_then(parse_leading_number) {
            let minutes = Table::cell(row, self.minutes)
                .and_then(parse_leading_number)
                .unwrap_or(0.0);
            let seconds = Table::cell(row, self.seconds)
                .and_then(parse_leading_number)
                .unwrap_or(0.0);
            let hemisphere = (degrees < 0.0).then_some(negative);
            return Some(dms_to_dd(degrees, minutes, seconds, hemisphere));
        }
        Table::cell(row, self.plain).and_then(parse_coordinate)
    }
}

/// Spidertracks exports
pub struct SpyderReader;

impl TrackReader for SpyderReader {
    fn format(&self) -> &'static str {
        "spy"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn signature(&self) -> Option<&FormatSignature> {
        Some(&SPY_SIGNATURE)
    }

    fn read(&self, path: &Path) -> Result<RawTrack> {
        let rows = table::load_rows(path)?;
        let header_row = detector::best_row_score(&rows, &SPY_SIGNATURE).1.unwrap_or(0);
        let table = Table::from_rows(rows, header_row)?;

        let speed = match (table.column(&["Speed(mph)"]), table.column(&["Speed(knots)"])) {
            (Some(i), _) => SpeedColumn::Mph(i),
            (None, Some(i)) => SpeedColumn::Knots(i),
            (None, None) => {
                return Err(ImportError::MissingColumns {
                    missing: vec!["Speed(mph)".to_string(), "Speed(knots)".to_string()],
                    found: table.header.clone(),
                });
            }
        };

        let latitude = AxisColumns::find(&table, "Latitude");
        let longitude = AxisColumns::find(&table, "Longitude");
        if latitude.is_empty() || longitude.is_empty() {
            return Err(ImportError::MissingColumns {
                missing: vec!["Latitude(decimal)".to_string(), "Longitude(decimal)".to_string()],
                found: table.header.clone(),
            });
        }

        let utc = table.require(&["DateTime(UTC)"])?;
        let local = table.column(&["DateTime(Local)"]);
        let registration = table.column(&["Registration"]);
        let altitude = table.column(&["Altitude(Feet)"]);
        let bearing = table.column(&["Bearing"]);

        let points: Vec<RawPoint> = table
            .data_rows()
            .map(|row| RawPoint {
                registration: Table::cell(row, registration).map(str::to_string),
                utc_datetime: Table::cell(row, Some(utc)).and_then(parse_utc),
                local_datetime: Table::cell(row, local).and_then(parse_naive),
                latitude: latitude.value(row, Hemisphere::South),
                longitude: longitude.value(row, Hemisphere::West),
                altitude_ft: Table::cell(row, altitude).and_then(parse_leading_number),
                knots: match speed {
                    SpeedColumn::Knots(i) => Table::cell(row, Some(i)).and_then(parse_leading_number),
                    SpeedColumn::Mph(i) => Table::cell(row, Some(i))
                        .and_then(parse_leading_number)
                        .map(mph_to_knots),
                },
                heading: Table::cell(row, bearing).and_then(parse_leading_number),
                is_new_segment: false,
            })
            .collect();

        if !points.is_empty() && points.iter().all(|p| p.utc_datetime.is_none()) {
            return Err(ImportError::UnparseableTimestamps {
                column: "DateTime(UTC)".to_string(),
            });
        }

        Ok(RawTrack::new(self.format(), points))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(contents: &str) -> Result<RawTrack> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spy.csv");
        std::fs::write(&path, contents).unwrap();
        SpyderReader.read(&path)
    }

    #[test]
    fn test_reads_mph_and_converts_to_knots() {
        let track = read(
            "Registration,DateTime(UTC),DateTime(Local),Latitude(decimal),Longitude(decimal),Altitude(Feet),Speed(mph),Bearing
N123AB,2019-06-01 18:00:00,2019-06-01 10:00:00,63.1,-151.2,3000,115.1,90
",
        )
        .unwrap();
        let p = &track.points[0];
        assert!((p.knots.unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(p.heading, Some(90.0));
        assert_eq!(p.latitude, Some(63.1));
        assert!(p.local_datetime.is_some());
    }

    #[test]
    fn test_dms_columns_when_decimal_missing() {
        let track = read(
            "Registration,DateTime(UTC),Latitude(degrees),Latitude(minutes),Latitude(seconds),Longitude(degrees),Longitude(minutes),Longitude(seconds),Speed(knots)
N123AB,2019-06-01 18:00:00,63,30,0,-151,15,0,80
",
        )
        .unwrap();
        let p = &track.points[0];
        assert!((p.latitude.unwrap() - 63.5).abs() < 1e-9);
        assert!((p.longitude.unwrap() + 151.25).abs() < 1e-9);
    }

    #[test]
    fn test_missing_speed_names_columns() {
        let err = read("Registration,DateTime(UTC),Latitude(decimal),Longitude(decimal)\nN1,2019-06-01 18:00:00,1,2\n")
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Speed(mph)"));
        assert!(message.contains("DateTime(UTC)"));
    }
}
