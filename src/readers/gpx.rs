use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use super::TrackReader;
use crate::error::{ImportError, Result};
use crate::points::{RawPoint, RawTrack};
use crate::units::meters_to_feet;

/// Every timestamped track point in a GPX document, in document order
pub fn read_gpx_points(path: &Path) -> Result<Vec<RawPoint>> {
    let file = File::open(path)?;
    let document = ::gpx::read(BufReader::new(file)).map_err(|e| ImportError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut points = Vec::new();
    let mut untimed = 0usize;
    for track in document.tracks {
        for segment in track.segments {
            for waypoint in segment.points {
                let utc_datetime = waypoint
                    .time
                    .and_then(|t| t.format().ok())
                    .and_then(|iso| DateTime::parse_from_rfc3339(&iso).ok())
                    .map(|dt| dt.with_timezone(&Utc));
                if utc_datetime.is_none() {
                    untimed += 1;
                }
                let position = waypoint.point();
                points.push(RawPoint {
                    utc_datetime,
                    latitude: Some(position.y()),
                    longitude: Some(position.x()),
                    altitude_ft: waypoint.elevation.map(meters_to_feet),
                    ..Default::default()
                });
            }
        }
    }
    if untimed > 0 {
        debug!("{} track points without a time in {:?}", untimed, path);
    }
    Ok(points)
}

pub struct GpxReader;

impl TrackReader for GpxReader {
    fn format(&self) -> &'static str {
        "gpx"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["gpx"]
    }

    fn read(&self, path: &Path) -> Result<RawTrack> {
        Ok(RawTrack::new(self.format(), read_gpx_points(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <name>N709M</name>
    <trkseg>
      <trkpt lat="63.0712" lon="-151.0551"><ele>1000</ele><time>2019-06-01T18:00:00Z</time></trkpt>
      <trkpt lat="63.0812" lon="-151.0651"><ele>1100</ele><time>2019-06-01T18:01:00Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>
"#;

    #[test]
    fn test_reads_track_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("N709M.gpx");
        std::fs::write(&path, SAMPLE_GPX).unwrap();

        let track = GpxReader.read(&path).unwrap();
        assert_eq!(track.points.len(), 2);
        let p = &track.points[0];
        assert_eq!(p.latitude, Some(63.0712));
        assert_eq!(p.longitude, Some(-151.0551));
        assert!((p.altitude_ft.unwrap() - 3280.8399).abs() < 1e-6);
        assert!(p.utc_datetime.is_some());
    }

    #[test]
    fn test_malformed_gpx_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.gpx");
        std::fs::write(&path, "<gpx><trk>").unwrap();
        assert!(GpxReader.read(&path).is_err());
    }
}
