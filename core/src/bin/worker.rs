//! `erp-core-worker`: drains the domain-event and POS outboxes and runs the
//! background job scheduler (C12). Runs as a separate long-lived process
//! from the HTTP server per spec.md §5 ("background jobs run on separate
//! long-lived workers").

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use event_bus::{EventBus, InMemoryBus, NatsBus};
use serde_json::json;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use erp_core::config::Config;
use erp_core::db;
use erp_core::domain::scheduler::BackgroundJobSchedule;
use erp_core::repos::scheduler_repo;
use erp_core::services::outbox;
use erp_core::services::scheduler::{due_now, overdue_now, JobOutcome, JobStatus};

const WORKER_NAME: &str = "erp-core-worker";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting ERP core worker...");

    let config = Config::from_env().expect("Failed to load configuration from environment");

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let bus: Arc<dyn EventBus> = match config.bus_type.to_lowercase().as_str() {
        "inmemory" => {
            tracing::info!("Using InMemory event bus");
            Arc::new(InMemoryBus::new())
        }
        "nats" => {
            tracing::info!(url = %config.nats_url, "Connecting to NATS");
            let client = async_nats::connect(&config.nats_url)
                .await
                .expect("Failed to connect to NATS");
            Arc::new(NatsBus::new(client))
        }
        other => panic!("Invalid BUS_TYPE: {other}. Must be 'inmemory' or 'nats'"),
    };

    let poll_interval = Duration::from_secs(config.worker_poll_interval_secs);

    loop {
        if let Err(err) = drain_outboxes(&pool, &bus, &config).await {
            tracing::warn!(error = %err, "outbox drain pass failed");
        }

        if let Err(err) = run_due_schedules(&pool).await {
            tracing::warn!(error = %err, "schedule poll pass failed");
        }

        report_overdue_schedules(&pool).await;

        if let Err(err) = heartbeat(&pool).await {
            tracing::warn!(error = %err, "heartbeat upsert failed");
        }

        tokio::time::sleep(poll_interval).await;
    }
}

async fn drain_outboxes(
    pool: &PgPool,
    bus: &Arc<dyn EventBus>,
    config: &Config,
) -> Result<(), erp_core::error::CoreError> {
    let domain_published =
        outbox::drain_domain_events(pool, bus, config.outbox_batch_size, config.outbox_max_attempts)
            .await?;
    let pos_published =
        outbox::drain_pos_events(pool, bus, config.outbox_batch_size, config.outbox_max_attempts).await?;

    if domain_published > 0 || pos_published > 0 {
        tracing::info!(domain_published, pos_published, "outbox drain pass complete");
    }

    Ok(())
}

/// Pops due schedules `FOR UPDATE SKIP LOCKED`, runs each job, and advances
/// its `next_run_at`. A schedule whose job_code has no registered handler
/// still gets a Run row recorded with a failed status and error message, so
/// it surfaces through `recent_runs` rather than silently never advancing.
async fn run_due_schedules(pool: &PgPool) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    let candidates = scheduler_repo::due_schedules(pool, now).await?;
    let due = due_now(&candidates, now);

    for schedule in due {
        let outcome = execute_job(schedule).await;

        let mut tx = pool.begin().await?;
        let run_id = scheduler_repo::start_run(&mut tx, schedule.id, now).await?;
        scheduler_repo::finish_run(&mut tx, run_id, outcome.status_str(), outcome.error.as_deref(), Utc::now()).await?;
        scheduler_repo::advance_schedule(&mut tx, schedule.id, now, schedule.interval_seconds).await?;
        tx.commit().await?;

        match outcome.status {
            JobStatus::Succeeded => {
                tracing::info!(job_code = %schedule.job_code, company_id = %schedule.company_id, "background job succeeded");
            }
            JobStatus::Failed => {
                tracing::warn!(job_code = %schedule.job_code, company_id = %schedule.company_id, error = ?outcome.error, "background job failed");
            }
        }
    }

    Ok(())
}

/// Runs a single schedule's job. There are no built-in job codes yet — an
/// operator registering a `background_job_schedules` row is expected to
/// extend this match with the handler it names. Unknown codes fail loudly
/// rather than silently succeeding, so the schedule surfaces in
/// `recent_runs` instead of quietly never doing anything.
async fn execute_job(schedule: &BackgroundJobSchedule) -> JobOutcome {
    JobOutcome {
        status: JobStatus::Failed,
        error: Some(format!(
            "no handler registered for job_code '{}'",
            schedule.job_code
        )),
    }
}

async fn report_overdue_schedules(pool: &PgPool) {
    let now = Utc::now();
    let candidates = match scheduler_repo::overdue_schedules(pool, now).await {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(error = %err, "failed to load overdue schedules");
            return;
        }
    };

    for schedule in overdue_now(&candidates, now) {
        tracing::warn!(
            job_code = %schedule.job_code,
            company_id = %schedule.company_id,
            next_run_at = %schedule.next_run_at,
            "background job schedule is overdue by more than 5 minutes"
        );
    }
}

async fn heartbeat(pool: &PgPool) -> Result<(), sqlx::Error> {
    let companies: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM companies")
        .fetch_all(pool)
        .await?;

    let now = Utc::now();
    for (company_id,) in companies {
        scheduler_repo::upsert_heartbeat(pool, WORKER_NAME, company_id, now, json!({})).await?;
    }

    Ok(())
}
