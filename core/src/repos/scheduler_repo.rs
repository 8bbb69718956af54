//! Backs C12's schedule/heartbeat half (the outbox half lives in
//! `outbox_repo`).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::scheduler::{BackgroundJobRun, BackgroundJobSchedule};

pub async fn due_schedules(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<BackgroundJobSchedule>, sqlx::Error> {
    sqlx::query_as::<_, BackgroundJobSchedule>(
        r#"
        SELECT id, company_id, job_code, enabled, interval_seconds, options_json, last_run_at, next_run_at
        FROM background_job_schedules
        WHERE enabled = true AND next_run_at <= $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

pub async fn overdue_schedules(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<BackgroundJobSchedule>, sqlx::Error> {
    sqlx::query_as::<_, BackgroundJobSchedule>(
        r#"
        SELECT id, company_id, job_code, enabled, interval_seconds, options_json, last_run_at, next_run_at
        FROM background_job_schedules
        WHERE enabled = true AND next_run_at < $1 - INTERVAL '5 minutes'
        "#,
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

pub async fn start_run(tx: &mut Transaction<'_, Postgres>, schedule_id: Uuid, started_at: DateTime<Utc>) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO background_job_runs (id, schedule_id, status, started_at) VALUES ($1, $2, 'running', $3)",
    )
    .bind(id)
    .bind(schedule_id)
    .bind(started_at)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn finish_run(
    tx: &mut Transaction<'_, Postgres>,
    run_id: Uuid,
    status: &str,
    error: Option<&str>,
    finished_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE background_job_runs SET status = $2, error = $3, finished_at = $4 WHERE id = $1")
        .bind(run_id)
        .bind(status)
        .bind(error)
        .bind(finished_at)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn advance_schedule(
    tx: &mut Transaction<'_, Postgres>,
    schedule_id: Uuid,
    now: DateTime<Utc>,
    interval_seconds: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE background_job_schedules SET last_run_at = $2, next_run_at = $2 + make_interval(secs => $3) WHERE id = $1",
    )
    .bind(schedule_id)
    .bind(now)
    .bind(interval_seconds as f64)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[allow(dead_code)]
pub async fn recent_runs(
    pool: &PgPool,
    schedule_id: Uuid,
) -> Result<Vec<BackgroundJobRun>, sqlx::Error> {
    sqlx::query_as::<_, BackgroundJobRun>(
        "SELECT id, schedule_id, status, error, started_at, finished_at FROM background_job_runs WHERE schedule_id = $1 ORDER BY started_at DESC LIMIT 20",
    )
    .bind(schedule_id)
    .fetch_all(pool)
    .await
}

pub async fn upsert_heartbeat(
    pool: &PgPool,
    worker_name: &str,
    company_id: Uuid,
    last_seen_at: DateTime<Utc>,
    details: Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO worker_heartbeats (worker_name, company_id, last_seen_at, details)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (worker_name, company_id)
        DO UPDATE SET last_seen_at = $3, details = $4
        "#,
    )
    .bind(worker_name)
    .bind(company_id)
    .bind(last_seen_at)
    .bind(details)
    .execute(pool)
    .await?;
    Ok(())
}
