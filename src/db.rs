use anyhow::{Context, Result};
use sqlx::MySqlPool;

/// Schema for the attendance ledger, kept next to the code that queries it.
pub const ATTENDANCE_SCHEMA: &str = include_str!("../migrations/001_attendance_records.sql");

pub async fn init_db(database_url: &str) -> Result<MySqlPool> {
    MySqlPool::connect(database_url)
        .await
        .context("Failed to connect to database")
}

/// Creates the ledger table and its constraints when missing.
pub async fn ensure_schema(pool: &MySqlPool) -> Result<()> {
    sqlx::query(ATTENDANCE_SCHEMA)
        .execute(pool)
        .await
        .context("Failed to apply attendance schema")?;
    Ok(())
}
