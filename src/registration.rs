use once_cell::sync::Lazy;
use rand::RngExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

use crate::error::{ImportError, Result};

static TAIL_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^N[0-9]{1,5}[A-Z]{0,2}$").unwrap());

static FILENAME_TAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"N\d{1,5}[A-Z]{0,2}").unwrap());

const PLACEHOLDER_LEADING: &[u8] = b"ABCDEFGHIJKLMOPQRSTUVWXYZ";
const PLACEHOLDER_BODY: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PLACEHOLDER_BODY_LEN: usize = 5;

/// Aircraft registration attached to every point and flight.
///
/// Real US tail numbers always start with `N`; placeholders are synthesized
/// when a file carries no usable registration and always start with some
/// other letter so they can never collide with a real tail number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Registration {
    Tail(String),
    Placeholder(String),
}

impl Registration {
    /// Parse a user- or file-supplied tail number. Dashes and spaces are removed
    /// and the value is uppercased.
    pub fn parse_tail(value: &str) -> Result<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | ' '))
            .collect::<String>()
            .to_uppercase();
        if TAIL_NUMBER_RE.is_match(&normalized) {
            Ok(Registration::Tail(normalized))
        } else {
            Err(ImportError::InvalidRegistration(value.trim().to_string()))
        }
    }

    /// Interpret a registration read back from storage, where both kinds appear
    pub fn from_stored(value: &str) -> Result<Self> {
        match value.chars().next() {
            Some('N') => Self::parse_tail(value),
            Some(c) if c.is_ascii_uppercase() => Ok(Registration::Placeholder(value.to_string())),
            _ => Err(ImportError::InvalidRegistration(value.to_string())),
        }
    }

    /// First tail number embedded in a file name, e.g. `N123AB_2021-07-04.gpx`
    pub fn from_filename(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_string_lossy().to_uppercase();
        FILENAME_TAIL_RE
            .find_iter(&stem)
            .map(|m| m.as_str())
            .find(|candidate| TAIL_NUMBER_RE.is_match(candidate))
            .map(|tail| Registration::Tail(tail.to_string()))
    }

    pub fn placeholder() -> Self {
        let mut rng = rand::rng();
        let mut value = String::with_capacity(PLACEHOLDER_BODY_LEN + 1);
        value.push(PLACEHOLDER_LEADING[rng.random_range(0..PLACEHOLDER_LEADING.len())] as char);
        for _ in 0..PLACEHOLDER_BODY_LEN {
            value.push(PLACEHOLDER_BODY[rng.random_range(0..PLACEHOLDER_BODY.len())] as char);
        }
        Registration::Placeholder(value)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Registration::Tail(s) | Registration::Placeholder(s) => s,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Registration::Placeholder(_))
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Registration> for String {
    fn from(r: Registration) -> Self {
        match r {
            Registration::Tail(s) | Registration::Placeholder(s) => s,
        }
    }
}

impl TryFrom<String> for Registration {
    type Error = ImportError;

    fn try_from(value: String) -> Result<Self> {
        Registration::from_stored(&value)
    }
}

/// Where a resolved registration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationSource {
    Column,
    Caller,
    Filename,
    Synthesized,
}

/// Resolve a file's registration by precedence: a consistent value in the
/// file's own registration column, then the caller's value, then the file
/// name, then a synthesized placeholder.
///
/// An explicit caller value that is not a valid tail number is an error even
/// when the file itself carries a registration.
pub fn resolve(
    column_values: &[&str],
    caller: Option<&str>,
    path: &Path,
) -> Result<(Registration, RegistrationSource)> {
    let caller = match caller.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => Some(Registration::parse_tail(value)?),
        None => None,
    };

    let mut distinct: Vec<String> = column_values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_uppercase)
        .collect();
    distinct.sort();
    distinct.dedup();

    match distinct.as_slice() {
        [single] => match Registration::parse_tail(single) {
            Ok(r) => return Ok((r, RegistrationSource::Column)),
            Err(_) => warn!(
                "Registration column value '{}' in {:?} is not a valid tail number; ignoring it",
                single, path
            ),
        },
        [] => {}
        many => warn!(
            "Registration column in {:?} is inconsistent ({} distinct values); ignoring it",
            path,
            many.len()
        ),
    }

    if let Some(r) = caller {
        return Ok((r, RegistrationSource::Caller));
    }
    if let Some(r) = Registration::from_filename(path) {
        return Ok((r, RegistrationSource::Filename));
    }

    let placeholder = Registration::placeholder();
    warn!(
        "No registration found for {:?}; using placeholder {}",
        path, placeholder
    );
    Ok((placeholder, RegistrationSource::Synthesized))
}
