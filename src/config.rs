use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ImportError;
use crate::flights::SubmissionMethod;

pub const DEFAULT_SEG_TIME_DIFF: u32 = 15;
pub const DEFAULT_MIN_POINT_DISTANCE: f64 = 200.0;
pub const DEFAULT_TIMEZONE: &str = "US/Alaska";
pub const DEFAULT_CONFIG_FILE: &str = "overflights.toml";

/// Caller-supplied settings for importing one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportParams {
    /// Minutes between points that start a new flight
    pub seg_time_diff: u32,
    /// Meters below which a zero-elapsed point counts as jitter
    pub min_point_distance: f64,
    pub registration: Option<String>,
    pub submission_method: SubmissionMethod,
    pub operator_code: Option<String>,
    pub aircraft_type: Option<String>,
    pub force_import: bool,
    pub ignore_duplicate_flights: bool,
    pub submitted_by: Option<String>,
}

impl Default for ImportParams {
    fn default() -> Self {
        Self {
            seg_time_diff: DEFAULT_SEG_TIME_DIFF,
            min_point_distance: DEFAULT_MIN_POINT_DISTANCE,
            registration: None,
            submission_method: SubmissionMethod::default(),
            operator_code: None,
            aircraft_type: None,
            force_import: false,
            ignore_duplicate_flights: false,
            submitted_by: None,
        }
    }
}

impl ImportParams {
    /// Uppercased operator code, if one was given and it is three alphanumerics
    pub fn normalized_operator_code(&self) -> crate::error::Result<Option<String>> {
        normalize_operator_code(self.operator_code.as_deref())
    }
}

pub fn normalize_operator_code(code: Option<&str>) -> crate::error::Result<Option<String>> {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(c) if c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphanumeric()) => {
            Ok(Some(c.to_ascii_uppercase()))
        }
        Some(c) => Err(ImportError::InvalidOperatorCode(c.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub program: PathBuf,
    pub timeout_secs: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gpsbabel"),
            timeout_secs: 120,
        }
    }
}

impl ConverterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub to_address: String,
}

impl EmailConfig {
    /// Load email configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(EmailConfig {
            smtp_server: std::env::var("SMTP_SERVER")
                .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            smtp_username: std::env::var("SMTP_USERNAME")
                .map_err(|_| anyhow::anyhow!("SMTP_USERNAME not set"))?,
            smtp_password: std::env::var("SMTP_PASSWORD")
                .map_err(|_| anyhow::anyhow!("SMTP_PASSWORD not set"))?,
            from_address: std::env::var("FROM_EMAIL")
                .map_err(|_| anyhow::anyhow!("FROM_EMAIL not set"))?,
            to_address: std::env::var("TO_EMAIL")
                .map_err(|_| anyhow::anyhow!("TO_EMAIL not set"))?,
        })
    }
}

/// Settings file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Imported source files are moved here
    pub archive_dir: PathBuf,
    /// IANA zone used for local flight times
    pub timezone: String,
    pub import: ImportParams,
    pub converter: ConverterConfig,
    pub email: Option<EmailConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("archive"),
            timezone: DEFAULT_TIMEZONE.to_string(),
            import: ImportParams::default(),
            converter: ConverterConfig::default(),
            email: None,
        }
    }
}

impl AppConfig {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?;
        config.tz()?;
        Ok(config)
    }

    /// Load from the resolved path, or defaults when no file exists
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match config_path(explicit) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. `--config` argument
/// 2. `OVERFLIGHTS_CONFIG` env var
/// 3. `./overflights.toml` if it exists
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("OVERFLIGHTS_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = ImportParams::default();
        assert_eq!(params.seg_time_diff, 15);
        assert_eq!(params.min_point_distance, 200.0);
        assert!(!params.force_import);
        assert_eq!(AppConfig::default().tz().unwrap(), chrono_tz::US::Alaska);
    }

    #[test]
    fn test_operator_code() {
        assert_eq!(normalize_operator_code(Some(" k2a ")).unwrap(), Some("K2A".into()));
        assert_eq!(normalize_operator_code(Some("")).unwrap(), None);
        assert!(normalize_operator_code(Some("K2AV")).is_err());
        assert!(normalize_operator_code(Some("K-2")).is_err());
    }

    #[test]
    fn test_config_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overflights.toml");
        std::fs::write(
            &path,
            r#"
archive_dir = "/data/archive"
timezone = "America/Anchorage"

[import]
seg_time_diff = 20
operator_code = "K2A"

[converter]
timeout_secs = 30
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.archive_dir, PathBuf::from("/data/archive"));
        assert_eq!(config.import.seg_time_diff, 20);
        assert_eq!(config.import.min_point_distance, 200.0);
        assert_eq!(config.converter.program, PathBuf::from("gpsbabel"));
        assert_eq!(config.converter.timeout(), Duration::from_secs(30));
        assert!(config.email.is_none());
    }

    #[test]
    fn test_config_rejects_unknown_timezone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "timezone = \"Mars/Olympus\"\n").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn test_explicit_path_wins() {
        let p = config_path(Some(Path::new("/etc/x.toml")));
        assert_eq!(p, Some(PathBuf::from("/etc/x.toml")));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_var_path_used_without_argument() {
        unsafe { std::env::set_var("OVERFLIGHTS_CONFIG", "/srv/overflights/prod.toml") };
        let p = config_path(None);
        unsafe { std::env::remove_var("OVERFLIGHTS_CONFIG") };
        assert_eq!(p, Some(PathBuf::from("/srv/overflights/prod.toml")));
    }

    #[test]
    #[serial_test::serial]
    fn test_email_config_requires_credentials() {
        unsafe { std::env::remove_var("SMTP_USERNAME") };
        let err = EmailConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("SMTP_USERNAME"));
    }
}
