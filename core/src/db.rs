//! Connection-pool initialization.
//!
//! Mirrors `gl-rs::db::init_pool`: production defaults tuned down by env
//! vars so test suites don't exhaust connection limits.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(10);

    let min_connections = std::env::var("DB_MIN_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);

    let acquire_timeout_secs = std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(3);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Binds the tenant-isolation session variable for the lifetime of a
/// transaction. Called first thing after `BEGIN`, per the redesign flag in
/// spec.md §9 ("never rely on process-level or connection-pool caches").
/// Row-level-security policies on every tenant table key off this setting.
pub async fn set_company_context(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    company_id: uuid::Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config('app.current_company_id', $1, true)")
        .bind(company_id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}
