use std::path::Path;
use std::sync::Arc;
use tracing::info;

use super::TrackReader;
use super::gpx::read_gpx_points;
use crate::converter::TrackConverter;
use crate::error::{ImportError, Result};
use crate::points::RawTrack;

/// Garmin GDB databases, converted to GPX by an external tool and then read
/// like any other GPX file
pub struct GdbReader {
    converter: Arc<dyn TrackConverter>,
}

impl GdbReader {
    pub fn new(converter: Arc<dyn TrackConverter>) -> Self {
        Self { converter }
    }
}

impl TrackReader for GdbReader {
    fn format(&self) -> &'static str {
        "gdb"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["gdb"]
    }

    fn read(&self, path: &Path) -> Result<RawTrack> {
        let workdir = tempfile::tempdir()?;
        let output = workdir.path().join("converted.gpx");

        let result = self.converter.convert_to_gpx(path, &output);
        if !result.success {
            return Err(ImportError::Conversion {
                diagnostic: result.diagnostic,
            });
        }
        let converted = result.output_path.unwrap_or(output);
        info!("Converted {:?} to GPX", path);

        Ok(RawTrack::new(self.format(), read_gpx_points(&converted)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConversionResult;

    struct FixedConverter {
        gpx: Option<&'static str>,
    }

    impl TrackConverter for FixedConverter {
        fn convert_to_gpx(&self, _input: &Path, output: &Path) -> ConversionResult {
            match self.gpx {
                Some(contents) => {
                    std::fs::write(output, contents).unwrap();
                    ConversionResult {
                        success: true,
                        output_path: Some(output.to_path_buf()),
                        diagnostic: String::new(),
                    }
                }
                None => ConversionResult::failed("gdb: Unsupported file version 3"),
            }
        }
    }

    #[test]
    fn test_conversion_failure_propagates_diagnostic() {
        let reader = GdbReader::new(Arc::new(FixedConverter { gpx: None }));
        let err = reader.read(Path::new("track.gdb")).unwrap_err();
        assert_eq!(err.to_string(), "gdb: Unsupported file version 3");
    }

    #[test]
    fn test_reads_converted_output() {
        let gpx = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="t"><trk><trkseg>
<trkpt lat="61.0" lon="-150.0"><time>2019-06-01T18:00:00Z</time></trkpt>
</trkseg></trk></gpx>"#;
        let reader = GdbReader::new(Arc::new(FixedConverter { gpx: Some(gpx) }));
        let track = reader.read(Path::new("track.gdb")).unwrap();
        assert_eq!(track.format, "gdb");
        assert_eq!(track.points.len(), 1);
    }
}
