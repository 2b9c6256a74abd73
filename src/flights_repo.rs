use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::flight_store::FlightStore;
use crate::flights::{ImportBatch, NewFlightRow, NewLineRow, NewPointRow, StoredFlight};
use crate::landings::NewLandingRow;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

/// Tables rewritten by every import, vacuumed afterwards
const GEOMETRY_TABLES: &[&str] = &["flight_points", "flight_lines"];

/// Build a connection pool for `database_url`
pub fn connect(database_url: &str) -> Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .max_size(4)
        .build(manager)
        .context("Failed to create database connection pool")
}

/// Apply any pending migrations and return the versions applied
pub async fn run_migrations(pool: &PgPool) -> Result<Vec<String>> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
        Ok::<_, anyhow::Error>(applied.iter().map(|v| v.to_string()).collect())
    })
    .await?
}

#[derive(Clone)]
pub struct PgFlightStore {
    pool: PgPool,
}

impl PgFlightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FlightStore for PgFlightStore {
    async fn find_overlapping(
        &self,
        registration: &str,
        departure: NaiveDateTime,
        landing: NaiveDateTime,
    ) -> Result<Vec<StoredFlight>> {
        use crate::schema::flights::dsl;

        let pool = self.pool.clone();
        let registration = registration.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let rows = dsl::flights
                .filter(dsl::registration.eq(&registration))
                .filter(dsl::departure_datetime.le(landing))
                .filter(dsl::landing_datetime.ge(departure))
                .order(dsl::departure_datetime.asc())
                .select(StoredFlight::as_select())
                .load::<StoredFlight>(&mut conn)?;
            Ok::<Vec<StoredFlight>, anyhow::Error>(rows)
        })
        .await?
    }

    async fn find_by_flight_ids(&self, flight_ids: &[String]) -> Result<Vec<StoredFlight>> {
        use crate::schema::flights::dsl;

        let pool = self.pool.clone();
        let flight_ids = flight_ids.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let rows = dsl::flights
                .filter(dsl::flight_id.eq_any(&flight_ids))
                .select(StoredFlight::as_select())
                .load::<StoredFlight>(&mut conn)?;
            Ok::<Vec<StoredFlight>, anyhow::Error>(rows)
        })
        .await?
    }

    async fn insert_batch(&self, batch: &ImportBatch) -> Result<Vec<String>> {
        use crate::schema::{flight_lines, flight_points, flights};

        let pool = self.pool.clone();
        let flight_rows: Vec<NewFlightRow> = batch.flights.iter().map(NewFlightRow::from).collect();
        let batch = batch.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut conn = pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                let inserted: Vec<(i32, String)> = diesel::insert_into(flights::table)
                    .values(&flight_rows)
                    .returning((flights::id, flights::flight_id))
                    .get_results(conn)
                    .context("Failed to insert flights")?;
                let keys: HashMap<&str, i32> =
                    inserted.iter().map(|(id, fid)| (fid.as_str(), *id)).collect();

                let key_for = |flight_id: &str| {
                    keys.get(flight_id)
                        .copied()
                        .with_context(|| format!("No inserted flight row for {}", flight_id))
                };

                let point_rows = batch
                    .points
                    .iter()
                    .map(|p| Ok(NewPointRow::new(key_for(&p.flight_id)?, p)))
                    .collect::<Result<Vec<_>>>()?;
                // Stay well below the 65535 bind parameter limit
                for chunk in point_rows.chunks(5000) {
                    diesel::insert_into(flight_points::table)
                        .values(chunk)
                        .execute(conn)
                        .context("Failed to insert flight points")?;
                }

                let line_rows = batch
                    .lines
                    .iter()
                    .map(|l| Ok(NewLineRow::new(key_for(&l.flight_id)?, l)))
                    .collect::<Result<Vec<_>>>()?;
                diesel::insert_into(flight_lines::table)
                    .values(&line_rows)
                    .execute(conn)
                    .context("Failed to insert flight lines")?;

                debug!(
                    "Inserted {} flights, {} points and {} lines",
                    inserted.len(),
                    point_rows.len(),
                    line_rows.len()
                );
                Ok(inserted.into_iter().map(|(_, fid)| fid).collect())
            })
        })
        .await?
    }

    async fn maintain(&self) -> Result<()> {
        for table in GEOMETRY_TABLES {
            vacuum_analyze_table(&self.pool, table).await?;
        }
        Ok(())
    }

    async fn count_landings(&self, flight_id: &str) -> Result<usize> {
        use crate::schema::landings::dsl;

        let pool = self.pool.clone();
        let flight_id = flight_id.to_string();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let count: i64 = dsl::landings
                .filter(dsl::flight_id.eq(&flight_id))
                .count()
                .get_result(&mut conn)?;
            Ok::<usize, anyhow::Error>(usize::try_from(count).unwrap_or(0))
        })
        .await?
    }

    async fn insert_landings(
        &self,
        flight_id: &str,
        rows: &[NewLandingRow],
        replace: bool,
    ) -> Result<usize> {
        use crate::schema::landings::dsl;

        let pool = self.pool.clone();
        let flight_id = flight_id.to_string();
        let rows = rows.to_vec();

        tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut conn = pool.get()?;
            conn.transaction::<_, anyhow::Error, _>(|conn| {
                if replace {
                    let removed = diesel::delete(dsl::landings.filter(dsl::flight_id.eq(&flight_id)))
                        .execute(conn)?;
                    info!("Removed {} existing landings for {}", removed, flight_id);
                }
                let inserted = diesel::insert_into(dsl::landings)
                    .values(&rows)
                    .execute(conn)
                    .context("Failed to insert landings")?;
                Ok(inserted)
            })
        })
        .await?
    }
}

/// Run VACUUM ANALYZE on a table to reclaim space and update statistics
async fn vacuum_analyze_table(pool: &PgPool, table_name: &str) -> Result<()> {
    info!("Running VACUUM ANALYZE on table '{}'...", table_name);
    let pool = pool.clone();
    let table_name = table_name.to_string();

    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        // VACUUM cannot run inside a transaction block
        use diesel::connection::SimpleConnection;
        conn.batch_execute(&format!("VACUUM ANALYZE {}", table_name))
            .with_context(|| format!("Failed to VACUUM ANALYZE table '{}'", table_name))?;
        Ok::<(), anyhow::Error>(())
    })
    .await??;

    Ok(())
}
