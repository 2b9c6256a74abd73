//! Format readers and the registry that picks one for a file.
//!
//! Every reader turns one vendor format into [`RawTrack`] points. The registry
//! ranks the readers that accept a file's extension by how well each one's
//! column signature matches the file header, then tries them in that order
//! until one returns a track with all required columns.

pub mod aff;
pub mod coordinates;
pub mod detector;
pub mod gdb;
pub mod gpx;
pub mod gsat;
pub mod kml;
pub mod spyder;
pub mod table;
pub mod tabular;
pub mod tms;

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::converter::TrackConverter;
use crate::error::{ImportError, ReaderAttempt, Result};
use crate::points::RawTrack;
use detector::{FormatScore, FormatSignature};

/// Extensions whose contents are delimited text
pub const TABULAR_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

/// What the registry knows about a file before any reader runs
#[derive(Debug, Clone)]
pub struct FileSample<'a> {
    pub path: &'a Path,
    pub extension: String,
    /// Leading rows for delimited files, empty otherwise
    pub rows: Vec<Vec<String>>,
}

impl<'a> FileSample<'a> {
    pub fn new(path: &'a Path) -> Result<Self> {
        let extension = file_extension(path);
        let rows = if TABULAR_EXTENSIONS.contains(&extension.as_str()) {
            let mut rows = table::load_rows(path)?;
            rows.truncate(table::MAX_HEADER_SCAN_ROWS);
            rows
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            extension,
            rows,
        })
    }

    pub fn is_tabular(&self) -> bool {
        TABULAR_EXTENSIONS.contains(&self.extension.as_str())
    }
}

pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub trait TrackReader: Send + Sync {
    /// Short name used in logs and errors
    fn format(&self) -> &'static str;

    /// Lowercase extensions this reader accepts
    fn extensions(&self) -> &'static [&'static str];

    /// Column signature for delimited formats
    fn signature(&self) -> Option<&FormatSignature> {
        None
    }

    /// How well the file matches this reader. Readers without a column
    /// signature match on extension alone.
    fn detect_score(&self, sample: &FileSample) -> FormatScore {
        match self.signature() {
            Some(signature) => detector::best_row_score(&sample.rows, signature).0,
            None if self.extensions().contains(&sample.extension.as_str()) => FormatScore {
                score: 1.0,
                coverage: 1.0,
            },
            None => FormatScore::NONE,
        }
    }

    fn read(&self, path: &Path) -> Result<RawTrack>;
}

pub struct ReaderRegistry {
    readers: Vec<Box<dyn TrackReader>>,
}

impl ReaderRegistry {
    pub fn new(readers: Vec<Box<dyn TrackReader>>) -> Self {
        Self { readers }
    }

    /// Every supported format, with GDB files converted through `converter`
    pub fn standard(converter: Arc<dyn TrackConverter>) -> Self {
        Self::new(vec![
            Box::new(aff::AffReader),
            Box::new(gsat::GsatReader),
            Box::new(spyder::SpyderReader),
            Box::new(tms::TmsReader),
            Box::new(tabular::TabularReader),
            Box::new(gpx::GpxReader),
            Box::new(gdb::GdbReader::new(converter)),
            Box::new(kml::KmlReader),
        ])
    }

    /// Uppercase accepted extensions, sorted
    pub fn accepted_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .readers
            .iter()
            .flat_map(|r| r.extensions().iter().map(|e| e.to_uppercase()))
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }

    pub fn accepts(&self, path: &Path) -> bool {
        let extension = file_extension(path);
        self.readers
            .iter()
            .any(|r| r.extensions().contains(&extension.as_str()))
    }

    fn accepted_list(&self) -> String {
        let extensions = self.accepted_extensions();
        match extensions.split_last() {
            Some((last, rest)) if !rest.is_empty() => format!("{}, and {}", rest.join(", "), last),
            Some((last, _)) => last.clone(),
            None => String::new(),
        }
    }

    fn signatures(&self, extension: &str) -> Vec<FormatSignature> {
        self.readers
            .iter()
            .filter(|r| r.extensions().contains(&extension))
            .filter_map(|r| r.signature().copied())
            .collect()
    }

    /// Read a track file with the best-matching reader, falling back through
    /// every other reader for the extension when the first choice fails.
    pub fn read(&self, path: &Path) -> Result<RawTrack> {
        let sample = FileSample::new(path)?;
        let candidates: Vec<&dyn TrackReader> = self
            .readers
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| r.extensions().contains(&sample.extension.as_str()))
            .collect();

        if candidates.is_empty() {
            return Err(ImportError::UnsupportedFileType {
                extension: sample.extension.to_uppercase(),
                accepted: self.accepted_list(),
            });
        }

        let primary = if sample.is_tabular() {
            let detection = detector::detect(path, &sample.rows, &self.signatures(&sample.extension))?;
            info!(
                "Detected {} format for {:?} (score {:.2}, header row {})",
                detection.format, path, detection.score.score, detection.header_row
            );
            Some(detection.format)
        } else {
            None
        };

        let mut ranked: Vec<(FormatScore, &dyn TrackReader)> = candidates
            .into_iter()
            .map(|r| (r.detect_score(&sample), r))
            .collect();
        ranked.sort_by(|(a_score, a), (b_score, b)| {
            let a_primary = Some(a.format()) == primary;
            let b_primary = Some(b.format()) == primary;
            b_primary
                .cmp(&a_primary)
                .then_with(|| b_score.rank(a_score))
        });

        let mut attempts = Vec::new();
        let mut conversion_failure = None;
        for (score, reader) in ranked {
            debug!("Trying {} reader on {:?} (score {:.2})", reader.format(), path, score.score);
            match reader.read(path) {
                Ok(track) => {
                    let missing = track.missing_required();
                    if missing.is_empty() {
                        if !attempts.is_empty() {
                            warn!(
                                "{:?} was read by the {} reader after {} failed attempt(s)",
                                path,
                                reader.format(),
                                attempts.len()
                            );
                        }
                        return Ok(track);
                    }
                    attempts.push(ReaderAttempt {
                        reader: reader.format(),
                        error: format!("missing required column(s) {}", missing.join(", ")),
                    });
                }
                Err(e) => {
                    if let ImportError::Conversion { diagnostic } = &e {
                        conversion_failure = Some(diagnostic.clone());
                    }
                    attempts.push(ReaderAttempt {
                        reader: reader.format(),
                        error: e.to_string(),
                    });
                }
            }
        }

        // The converter's own message is the most useful thing to show
        if let Some(diagnostic) = conversion_failure {
            return Err(ImportError::Conversion { diagnostic });
        }

        Err(ImportError::ReadFailure {
            path: path.to_path_buf(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::ConversionResult;
    use crate::points::RawPoint;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    struct NoConverter;

    impl TrackConverter for NoConverter {
        fn convert_to_gpx(&self, _input: &Path, _output: &Path) -> ConversionResult {
            ConversionResult::failed("not available")
        }
    }

    struct FailingReader(&'static str);

    impl TrackReader for FailingReader {
        fn format(&self) -> &'static str {
            self.0
        }
        fn extensions(&self) -> &'static [&'static str] {
            &["csv"]
        }
        fn signature(&self) -> Option<&FormatSignature> {
            Some(&detector::TMS_SIGNATURE)
        }
        fn read(&self, _path: &Path) -> Result<RawTrack> {
            Err(ImportError::MissingColumns {
                missing: vec!["Latitude".into()],
                found: vec![],
            })
        }
    }

    struct WorkingReader;

    impl TrackReader for WorkingReader {
        fn format(&self) -> &'static str {
            "working"
        }
        fn extensions(&self) -> &'static [&'static str] {
            &["csv"]
        }
        fn read(&self, _path: &Path) -> Result<RawTrack> {
            Ok(RawTrack::new(
                "working",
                vec![RawPoint {
                    utc_datetime: Some(Utc.with_ymd_and_hms(2021, 7, 4, 18, 0, 0).unwrap()),
                    latitude: Some(61.0),
                    longitude: Some(-150.0),
                    ..Default::default()
                }],
            ))
        }
    }

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_unsupported_extension_names_accepted_types() {
        let registry = ReaderRegistry::standard(Arc::new(NoConverter));
        let err = registry.read(Path::new("track.xlsx")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected file type found: XLSX. Only CSV, GDB, GPX, KML, TSV, and TXT currently accepted."
        );
    }

    #[test]
    fn test_falls_back_when_primary_reader_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.csv", "Serial No., UTC, Latitude\n1,2021-07-04 18:00:00,6100.0\n");
        let registry =
            ReaderRegistry::new(vec![Box::new(FailingReader("tms")), Box::new(WorkingReader)]);
        let track = registry.read(&path).unwrap();
        assert_eq!(track.format, "working");
    }

    #[test]
    fn test_all_readers_failing_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.csv", "Serial No., UTC\n1,2\n");
        let registry = ReaderRegistry::new(vec![Box::new(FailingReader("tms"))]);
        assert!(matches!(
            registry.read(&path),
            Err(ImportError::ReadFailure { attempts, .. }) if attempts.len() == 1
        ));
    }

    #[test]
    fn test_conversion_failure_is_reported_verbatim() {
        let registry = ReaderRegistry::standard(Arc::new(NoConverter));
        let err = registry.read(Path::new("track.gdb")).unwrap_err();
        assert_eq!(err.to_string(), "not available");
    }

    #[test]
    fn test_unrecognized_header_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "t.csv", "foo,bar\n1,2\n");
        let registry = ReaderRegistry::standard(Arc::new(NoConverter));
        assert!(matches!(
            registry.read(&path),
            Err(ImportError::UnrecognizedFormat { .. })
        ));
    }
}
