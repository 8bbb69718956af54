use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BackgroundJobSchedule {
    pub id: Uuid,
    pub company_id: Uuid,
    pub job_code: String,
    pub enabled: bool,
    pub interval_seconds: i64,
    pub options_json: serde_json::Value,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
}

impl BackgroundJobSchedule {
    /// spec.md §4.12: surfaced to Ops once a schedule is more than five
    /// minutes overdue.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at < now - chrono::Duration::minutes(5)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum JobRunStatus {
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BackgroundJobRun {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub status: String,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkerHeartbeat {
    pub worker_name: String,
    pub company_id: Uuid,
    pub last_seen_at: DateTime<Utc>,
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum OutboxEventStatus {
    Pending,
    Processing,
    Done,
    Failed,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PosEventsOutbox {
    pub id: Uuid,
    pub company_id: Uuid,
    pub device_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
}
