use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use crate::config::normalize_operator_code;
use crate::diagnostics::Diagnostics;
use crate::error::{ImportError, Result};
use crate::flight_store::FlightStore;
use crate::registration::Registration;
use crate::segmenter;

/// Fee per passenger on a fee-paying landing, in dollars
pub const LANDING_FEE: f64 = 5.15;

/// Landing reports are always keyed to 15 minute departure buckets
pub const LANDING_FLIGHT_ID_MINUTES: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DbEnum)]
#[db_enum(existing_type_path = "crate::schema::sql_types::LandingType")]
#[serde(rename_all = "lowercase")]
pub enum LandingType {
    #[db_enum(rename = "scenic")]
    Scenic,
    #[db_enum(rename = "dropoff")]
    Dropoff,
    #[db_enum(rename = "pickup")]
    Pickup,
}

impl LandingType {
    /// Scenic landings are the only ones billed per passenger
    pub fn is_fee_paying(&self) -> bool {
        matches!(self, LandingType::Scenic)
    }
}

impl fmt::Display for LandingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LandingType::Scenic => write!(f, "scenic"),
            LandingType::Dropoff => write!(f, "dropoff"),
            LandingType::Pickup => write!(f, "pickup"),
        }
    }
}

impl FromStr for LandingType {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-', '_'], "").as_str() {
            "scenic" => Ok(LandingType::Scenic),
            "dropoff" => Ok(LandingType::Dropoff),
            "pickup" => Ok(LandingType::Pickup),
            _ => Err(ImportError::InvalidLanding(format!(
                "landing type '{s}' is not one of scenic, dropoff or pickup"
            ))),
        }
    }
}

/// One landing as reported by an operator, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingEvent {
    pub location: String,
    pub n_passengers: i32,
    pub landing_type: String,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// One flight's landing report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingSubmission {
    pub registration: String,
    /// Local departure time
    pub departure: NaiveDateTime,
    #[serde(default)]
    pub operator_code: Option<String>,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub landings: Vec<LandingEvent>,
}

/// Insert row for the landings table
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = crate::schema::landings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewLandingRow {
    pub flight_id: String,
    pub location: String,
    pub n_passengers: i32,
    pub landing_type: LandingType,
    pub justification: Option<String>,
    pub notes: Option<String>,
    pub sort_order: i32,
}

impl LandingSubmission {
    pub fn flight_id(&self) -> Result<String> {
        let registration = Registration::parse_tail(&self.registration)?;
        Ok(segmenter::flight_id(
            registration.as_str(),
            self.departure,
            LANDING_FLIGHT_ID_MINUTES,
        ))
    }

    /// Validate every landing and build the rows to store. Landings without a
    /// sort order are numbered in submission order after the largest given one.
    pub fn validate(&self) -> Result<Vec<NewLandingRow>> {
        normalize_operator_code(self.operator_code.as_deref())?;
        let flight_id = self.flight_id()?;

        let mut next_order = self
            .landings
            .iter()
            .filter_map(|l| l.sort_order)
            .max()
            .map_or(1, |m| m + 1);

        self.landings
            .iter()
            .enumerate()
            .map(|(i, landing)| {
                if landing.location.trim().is_empty() {
                    return Err(ImportError::InvalidLanding(format!(
                        "landing {} has no location",
                        i + 1
                    )));
                }
                if landing.n_passengers < 0 {
                    return Err(ImportError::InvalidLanding(format!(
                        "landing {} at {} has a negative passenger count ({})",
                        i + 1,
                        landing.location,
                        landing.n_passengers
                    )));
                }
                let landing_type: LandingType = landing.landing_type.parse()?;
                let sort_order = landing.sort_order.unwrap_or_else(|| {
                    let order = next_order;
                    next_order += 1;
                    order
                });
                Ok(NewLandingRow {
                    flight_id: flight_id.clone(),
                    location: landing.location.trim().to_string(),
                    n_passengers: landing.n_passengers,
                    landing_type,
                    justification: landing.justification.clone(),
                    notes: landing.notes.clone(),
                    sort_order,
                })
            })
            .collect()
    }
}

/// Passenger fees owed for a set of validated landings
pub fn landing_fees(rows: &[NewLandingRow]) -> f64 {
    let passengers: i32 = rows
        .iter()
        .filter(|r| r.landing_type.is_fee_paying())
        .map(|r| r.n_passengers)
        .sum();
    f64::from(passengers) * LANDING_FEE
}

/// Outcome of importing one landing report
#[derive(Debug, Clone, PartialEq)]
pub struct LandingSummary {
    pub flight_id: String,
    pub inserted: usize,
    pub fees: f64,
    pub diagnostics: Diagnostics,
}

impl LandingSummary {
    pub fn message(&self) -> String {
        format!(
            "{} landing(s) recorded for {} (fees ${:.2})",
            self.inserted, self.flight_id, self.fees
        )
    }
}

/// Store a landing report unless landings are already on record for the
/// flight. `force` replaces whatever was previously reported.
pub async fn import_landings(
    store: &dyn FlightStore,
    submission: &LandingSubmission,
    force: bool,
) -> anyhow::Result<LandingSummary> {
    let rows = submission.validate()?;
    let flight_id = submission.flight_id()?;
    let mut diagnostics = Diagnostics::new();

    if rows.is_empty() {
        diagnostics.info(format!("No landings reported for {flight_id}"));
        return Ok(LandingSummary {
            flight_id,
            inserted: 0,
            fees: 0.0,
            diagnostics,
        });
    }

    let existing = store.count_landings(&flight_id).await?;
    if existing > 0 {
        if !force {
            return Err(ImportError::LandingsAlreadyReported(flight_id).into());
        }
        diagnostics.warn(format!(
            "Replacing {existing} previously reported landing(s) for {flight_id}"
        ));
    }

    let inserted = store.insert_landings(&flight_id, &rows, force).await?;
    let fees = landing_fees(&rows);
    info!("Inserted {} landings for {} (fees ${:.2})", inserted, flight_id, fees);
    diagnostics.info(format!("{inserted} landing(s) recorded for {flight_id}"));

    Ok(LandingSummary {
        flight_id,
        inserted,
        fees,
        diagnostics,
    })
}
