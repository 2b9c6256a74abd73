pub mod archive;
pub mod batch;
pub mod config;
pub mod converter;
pub mod diagnostics;
pub mod editor_export;
pub mod error;
pub mod flight_store;
pub mod flights;
pub mod flights_repo;
pub mod import;
pub mod kinematics;
pub mod landings;
pub mod log_format;
pub mod notifications;
pub mod points;
pub mod readers;
pub mod registration;
pub mod schema;
pub mod segmenter;
pub mod timestamps;
pub mod track_formatter;
pub mod units;

pub use error::{ImportError, Result};
