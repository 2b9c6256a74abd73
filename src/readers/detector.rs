//! Scores header rows against the known column signatures of each tabular
//! source format.

use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

use super::table::{MAX_HEADER_SCAN_ROWS, named_columns};
use crate::error::{ImportError, Result};

/// Column names a tabular source format is known to export
#[derive(Debug, Clone, Copy)]
pub struct FormatSignature {
    pub format: &'static str,
    pub columns: &'static [&'static str],
}

pub const AFF_SIGNATURE: FormatSignature = FormatSignature {
    format: "aff",
    columns: &[
        "Registration",
        "Longitude",
        "Latitude",
        "Speed (kts)",
        "Heading (True)",
        "Altitude (FT MSL)",
        "Fix",
        "PDOP",
        "HDOP",
        "posnAcquiredUTC",
        "posnAcquiredUTC -8",
        "usageType",
        "source",
        "Latency (Sec)",
    ],
};

pub const GSAT_SIGNATURE: FormatSignature = FormatSignature {
    format: "gsat",
    columns: &[
        "Asset",
        "IMEI/Unit #/Device ID",
        "Device",
        "Positions",
        "Events",
        "Messages",
        "Alerts",
    ],
};

pub const SPY_SIGNATURE: FormatSignature = FormatSignature {
    format: "spy",
    columns: &[
        "Registration",
        "DateTime(UTC)",
        "DateTime(Local)",
        "Latitude",
        "Latitude(degrees)",
        "Latitude(minutes)",
        "Latitude(seconds)",
        "Latitude(decimal)",
        "Longitude",
        "Longitude(degrees)",
        "Longitude(minutes)",
        "Longitude(seconds)",
        "Longitude(decimal)",
        "Altitude(Feet)",
        "Speed(knots)",
        "Speed(mph)",
        "Bearing",
        "PointType",
        "Description",
    ],
};

pub const TMS_SIGNATURE: FormatSignature = FormatSignature {
    format: "tms",
    columns: &[
        "Serial No.",
        "UTC",
        "Latitude",
        "HemNS",
        "Longititude",
        "HemEW",
        "Knots",
        "Heading",
        "Altitude (m)",
        "HDOP",
        "New Conn",
        "Entered",
        "Event",
    ],
};

pub const TABULAR_SIGNATURE: FormatSignature = FormatSignature {
    format: "tabular",
    columns: &[
        "registration",
        "utc_datetime",
        "local_datetime",
        "ak_datetime",
        "latitude",
        "longitude",
        "altitude_ft",
        "knots",
        "heading",
        "is_new_segment",
    ],
};

/// Catalog order is the final tie-break
pub const CATALOG: &[FormatSignature] = &[
    AFF_SIGNATURE,
    GSAT_SIGNATURE,
    SPY_SIGNATURE,
    TMS_SIGNATURE,
    TABULAR_SIGNATURE,
];

pub fn accepted_formats(catalog: &[FormatSignature]) -> String {
    catalog
        .iter()
        .map(|s| s.format.to_uppercase())
        .collect::<Vec<_>>()
        .join(", ")
}

/// How well one header row matches one signature
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FormatScore {
    /// Share of the row's named columns that the signature expects
    pub score: f64,
    /// Share of the signature's columns present in the row. Between equal
    /// scores the smaller, more specific signature covers more of itself.
    pub coverage: f64,
}

impl FormatScore {
    pub const NONE: FormatScore = FormatScore {
        score: 0.0,
        coverage: 0.0,
    };

    pub fn is_match(&self) -> bool {
        self.score > 0.0
    }

    /// Higher score first, then higher coverage
    pub fn rank(&self, other: &FormatScore) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then(
                self.coverage
                    .partial_cmp(&other.coverage)
                    .unwrap_or(Ordering::Equal),
            )
    }
}

/// `|named ∩ expected| / |named|` for one header row
pub fn match_score(named: &[String], signature: &FormatSignature) -> FormatScore {
    if named.is_empty() {
        return FormatScore::NONE;
    }
    let matched = named
        .iter()
        .filter(|c| signature.columns.iter().any(|e| e.trim() == c.as_str()))
        .count();
    FormatScore {
        score: matched as f64 / named.len() as f64,
        coverage: if signature.columns.is_empty() {
            0.0
        } else {
            matched as f64 / signature.columns.len() as f64
        },
    }
}

/// Best score a signature reaches on any of the leading rows, with the row it was found on
pub fn best_row_score(rows: &[Vec<String>], signature: &FormatSignature) -> (FormatScore, Option<usize>) {
    let mut best = (FormatScore::NONE, None);
    for (i, row) in rows.iter().take(MAX_HEADER_SCAN_ROWS).enumerate() {
        let named = named_columns(row);
        if named.is_empty() {
            continue;
        }
        let score = match_score(&named, signature);
        if score.rank(&best.0) == Ordering::Greater {
            best = (score, Some(i));
        }
    }
    best
}

/// Result of header detection
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub format: &'static str,
    pub header_row: usize,
    pub score: FormatScore,
}

/// Scan the leading rows for the first header that some signature matches
/// and return the best signature for that row.
///
/// Rows with no named columns are skipped, as are rows no signature matches
/// at all, so decorative title rows above the header are tolerated.
pub fn detect(path: &Path, rows: &[Vec<String>], catalog: &[FormatSignature]) -> Result<Detection> {
    for (i, row) in rows.iter().take(MAX_HEADER_SCAN_ROWS).enumerate() {
        let named = named_columns(row);
        if named.is_empty() {
            continue;
        }

        let mut best: Option<Detection> = None;
        for signature in catalog {
            let score = match_score(&named, signature);
            debug!("{:?} row {} scores {:.2} for {}", path, i, score.score, signature.format);
            let better = match &best {
                None => score.is_match(),
                Some(current) => score.rank(&current.score) == Ordering::Greater,
            };
            if better {
                best = Some(Detection {
                    format: signature.format,
                    header_row: i,
                    score,
                });
            }
        }

        if let Some(detection) = best {
            return Ok(detection);
        }
    }

    Err(ImportError::UnrecognizedFormat {
        path: path.to_path_buf(),
        accepted: accepted_formats(catalog),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_signature_scores_one_and_others_zero() {
        let header = row(TMS_SIGNATURE.columns);
        let named = named_columns(&header);
        assert_eq!(match_score(&named, &TMS_SIGNATURE).score, 1.0);
        assert_eq!(match_score(&named, &GSAT_SIGNATURE).score, 0.0);

        let gsat = named_columns(&row(GSAT_SIGNATURE.columns));
        assert_eq!(match_score(&gsat, &GSAT_SIGNATURE).score, 1.0);
        for other in [AFF_SIGNATURE, SPY_SIGNATURE, TMS_SIGNATURE, TABULAR_SIGNATURE] {
            assert_eq!(match_score(&gsat, &other).score, 0.0, "{}", other.format);
        }
    }

    #[test]
    fn test_detect_skips_decorative_rows() {
        let rows = vec![
            row(&["", "Unnamed: 1"]),
            row(&["Flight log export"]),
            row(&[
                "Serial No.", " UTC", " Latitude", " HemNS", " Longititude", " HemEW", " Knots",
            ]),
        ];
        let detection = detect(Path::new("t.csv"), &rows, CATALOG).unwrap();
        assert_eq!(detection.format, "tms");
        assert_eq!(detection.header_row, 2);
    }

    #[test]
    fn test_higher_score_beats_coverage() {
        // AFF matches three of these four columns, SPY all four
        let rows = vec![row(&["Registration", "Latitude", "Longitude", "Speed(knots)"])];
        let detection = detect(Path::new("t.csv"), &rows, CATALOG).unwrap();
        assert_eq!(detection.format, "spy");
    }

    #[test]
    fn test_equal_scores_prefer_more_specific_signature() {
        // AFF (14 columns) and TMS (13 columns) both expect every column here
        let rows = vec![row(&["Latitude", "HDOP"])];
        let named = named_columns(&rows[0]);
        let aff = match_score(&named, &AFF_SIGNATURE);
        let tms = match_score(&named, &TMS_SIGNATURE);
        assert_eq!(aff.score, tms.score);
        assert_eq!(tms.rank(&aff), Ordering::Greater);

        let detection = detect(Path::new("t.csv"), &rows, CATALOG).unwrap();
        assert_eq!(detection.format, "tms");
    }

    #[test]
    fn test_identical_rank_falls_back_to_catalog_order() {
        let first = FormatSignature {
            format: "first",
            columns: &["Latitude", "Longitude"],
        };
        let second = FormatSignature {
            format: "second",
            columns: &["Longitude", "Latitude"],
        };
        let rows = vec![row(&["Latitude", "Longitude"])];
        let detection = detect(Path::new("t.csv"), &rows, &[first, second]).unwrap();
        assert_eq!(detection.format, "first");
    }

    #[test]
    fn test_detect_unrecognized() {
        let rows = vec![row(&["foo", "bar"]), row(&["1", "2"])];
        let err = detect(Path::new("t.csv"), &rows, CATALOG).unwrap_err();
        assert!(err.to_string().contains("AFF, GSAT, SPY, TMS, TABULAR"));
    }
}
