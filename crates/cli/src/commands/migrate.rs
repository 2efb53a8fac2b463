//! Database migration command.
//!
//! Migrations live in `crates/api/migrations/` and are embedded at
//! compile time, so the binary can migrate any environment it can reach.

use super::{CommandError, connect};

/// Run all pending database migrations.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration
/// fails to apply.
pub async fn run() -> Result<(), CommandError> {
    tracing::info!("Connecting to database...");
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
