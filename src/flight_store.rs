use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tracing::debug;

use crate::flights::{FlightSegment, ImportBatch, LineRecord, PointRecord, StoredFlight};
use crate::landings::NewLandingRow;

/// Storage the importer writes to and checks duplicates against
#[async_trait]
pub trait FlightStore: Send + Sync {
    /// Stored flights of `registration` whose window shares any instant with
    /// `[departure, landing]`
    async fn find_overlapping(
        &self,
        registration: &str,
        departure: NaiveDateTime,
        landing: NaiveDateTime,
    ) -> Result<Vec<StoredFlight>>;

    /// Stored flights whose flight id is one of `flight_ids`
    async fn find_by_flight_ids(&self, flight_ids: &[String]) -> Result<Vec<StoredFlight>>;

    /// Write every flight, point and line of the batch atomically and return
    /// the inserted flight ids
    async fn insert_batch(&self, batch: &ImportBatch) -> Result<Vec<String>>;

    /// Reclaim space and refresh planner statistics on the geometry tables
    async fn maintain(&self) -> Result<()>;

    async fn count_landings(&self, flight_id: &str) -> Result<usize>;

    /// Store landings for one flight, first removing existing ones when `replace` is set
    async fn insert_landings(
        &self,
        flight_id: &str,
        rows: &[NewLandingRow],
        replace: bool,
    ) -> Result<usize>;
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i32,
    flights: Vec<(StoredFlight, FlightSegment)>,
    points: Vec<PointRecord>,
    lines: Vec<LineRecord>,
    landings: Vec<NewLandingRow>,
    maintenance_runs: usize,
}

/// In-process store used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryFlightStore {
    state: Mutex<MemoryState>,
    fail_maintenance: bool,
}

impl MemoryFlightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose maintenance step always errors
    pub fn with_failing_maintenance() -> Self {
        Self {
            fail_maintenance: true,
            ..Self::default()
        }
    }

    pub async fn flights(&self) -> Vec<FlightSegment> {
        let state = self.state.lock().await;
        state.flights.iter().map(|(_, f)| f.clone()).collect()
    }

    pub async fn point_count(&self) -> usize {
        self.state.lock().await.points.len()
    }

    pub async fn line_count(&self) -> usize {
        self.state.lock().await.lines.len()
    }

    pub async fn landings(&self, flight_id: &str) -> Vec<NewLandingRow> {
        let state = self.state.lock().await;
        state
            .landings
            .iter()
            .filter(|l| l.flight_id == flight_id)
            .cloned()
            .collect()
    }

    pub async fn maintenance_runs(&self) -> usize {
        self.state.lock().await.maintenance_runs
    }
}

#[async_trait]
impl FlightStore for MemoryFlightStore {
    async fn find_overlapping(
        &self,
        registration: &str,
        departure: NaiveDateTime,
        landing: NaiveDateTime,
    ) -> Result<Vec<StoredFlight>> {
        let state = self.state.lock().await;
        Ok(state
            .flights
            .iter()
            .filter(|(_, f)| f.overlaps(registration, departure, landing))
            .map(|(stored, _)| stored.clone())
            .collect())
    }

    async fn find_by_flight_ids(&self, flight_ids: &[String]) -> Result<Vec<StoredFlight>> {
        let state = self.state.lock().await;
        Ok(state
            .flights
            .iter()
            .filter(|(stored, _)| flight_ids.contains(&stored.flight_id))
            .map(|(stored, _)| stored.clone())
            .collect())
    }

    async fn insert_batch(&self, batch: &ImportBatch) -> Result<Vec<String>> {
        let mut state = self.state.lock().await;
        if let Some(f) = batch
            .flights
            .iter()
            .find(|f| state.flights.iter().any(|(s, _)| s.flight_id == f.flight_id))
        {
            anyhow::bail!(
                "duplicate key value violates unique constraint \"flights_flight_id_key\": {}",
                f.flight_id
            );
        }

        let mut inserted = Vec::with_capacity(batch.flights.len());
        for flight in &batch.flights {
            state.next_id += 1;
            let stored = StoredFlight {
                id: state.next_id,
                flight_id: flight.flight_id.clone(),
                registration: flight.registration.clone(),
                departure_datetime: flight.departure_datetime,
                landing_datetime: flight.landing_datetime,
            };
            state.flights.push((stored, flight.clone()));
            inserted.push(flight.flight_id.clone());
        }
        state.points.extend(batch.points.iter().cloned());
        state.lines.extend(batch.lines.iter().cloned());
        debug!("Stored {} flights in memory", inserted.len());
        Ok(inserted)
    }

    async fn maintain(&self) -> Result<()> {
        if self.fail_maintenance {
            anyhow::bail!("maintenance is unavailable");
        }
        self.state.lock().await.maintenance_runs += 1;
        Ok(())
    }

    async fn count_landings(&self, flight_id: &str) -> Result<usize> {
        let state = self.state.lock().await;
        Ok(state.landings.iter().filter(|l| l.flight_id == flight_id).count())
    }

    async fn insert_landings(
        &self,
        flight_id: &str,
        rows: &[NewLandingRow],
        replace: bool,
    ) -> Result<usize> {
        let mut state = self.state.lock().await;
        if replace {
            state.landings.retain(|l| l.flight_id != flight_id);
        }
        state.landings.extend(rows.iter().cloned());
        Ok(rows.len())
    }
}
