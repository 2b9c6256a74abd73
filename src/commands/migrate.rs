use anyhow::{Context, Result};
use tracing::info;

use overflights::flights_repo;

/// Apply pending database migrations
pub async fn handle_migrate() -> Result<()> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = flights_repo::connect(&database_url)?;
    let applied = flights_repo::run_migrations(&pool).await?;
    if applied.is_empty() {
        info!("Database schema is up to date");
    } else {
        for version in &applied {
            info!("Applied migration {}", version);
        }
    }
    Ok(())
}
