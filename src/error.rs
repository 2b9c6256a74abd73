use chrono::NaiveDateTime;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A flight that was already present in the store when an import was attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateFlight {
    pub registration: String,
    pub departure: NaiveDateTime,
    pub existing_flight_id: String,
}

impl fmt::Display for DuplicateFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} departing {} (stored as {})",
            self.registration,
            self.departure.format("%Y-%m-%d %H:%M"),
            self.existing_flight_id
        )
    }
}

/// One reader that was tried and why it was rejected
#[derive(Debug, Clone)]
pub struct ReaderAttempt {
    pub reader: &'static str,
    pub error: String,
}

fn list_attempts(attempts: &[ReaderAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.reader, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

fn duplicate_count(duplicates: &[DuplicateFlight], all_existing: &bool) -> String {
    if *all_existing {
        "All".to_string()
    } else {
        duplicates.len().to_string()
    }
}

fn list_duplicates(duplicates: &[DuplicateFlight]) -> String {
    duplicates
        .iter()
        .map(|d| format!("\n\t- {d}"))
        .collect::<String>()
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Unexpected file type found: {extension}. Only {accepted} currently accepted.")]
    UnsupportedFileType { extension: String, accepted: String },

    #[error("Could not determine the format of {path:?}. Accepted formats: {accepted}")]
    UnrecognizedFormat { path: PathBuf, accepted: String },

    #[error("Failed to read {path:?} with any reader: {}", list_attempts(.attempts))]
    ReadFailure {
        path: PathBuf,
        attempts: Vec<ReaderAttempt>,
    },

    #[error("Could not parse {path:?}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Missing required column(s) {missing:?}; found {found:?}")]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("No parseable timestamps found in column '{column}'")]
    UnparseableTimestamps { column: String },

    #[error("Invalid registration '{0}'")]
    InvalidRegistration(String),

    #[error("Invalid operator code '{0}': expected 3 alphanumeric characters")]
    InvalidOperatorCode(String),

    #[error("No flight segments found in {0:?}")]
    NoFlightSegments(PathBuf),

    #[error(
        "{} of {total} flight segments already exist in the database:{}",
        duplicate_count(.duplicates, .all_existing),
        list_duplicates(.duplicates)
    )]
    DuplicateFlights {
        duplicates: Vec<DuplicateFlight>,
        total: usize,
        all_existing: bool,
    },

    #[error(
        "No new flight segments were inserted from this file because they all already exist in the database."
    )]
    NoNewFlights,

    #[error(
        "Flight id {flight_id} is already used by a stored flight ({existing_departure} to {existing_landing}). \
         The new segment departs {departure} and does not overlap it; use a different segmentation interval or split point."
    )]
    FlightIdTaken {
        flight_id: String,
        departure: NaiveDateTime,
        existing_departure: NaiveDateTime,
        existing_landing: NaiveDateTime,
    },

    #[error("{diagnostic}")]
    Conversion { diagnostic: String },

    #[error("Invalid landing: {0}")]
    InvalidLanding(String),

    #[error("All landings already reported for flight {0}")]
    LandingsAlreadyReported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ImportError>;
