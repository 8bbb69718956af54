//! Background Scheduler (C12, schedule half).
//!
//! The poll/execute/advance loop itself lives in the `erp-core-worker`
//! binary; this module holds the per-tick logic so it's unit-testable
//! without a live database.

use chrono::{DateTime, Utc};

use crate::domain::scheduler::BackgroundJobSchedule;

/// A single schedule tick's outcome, ready for the worker to persist via
/// `scheduler_repo::finish_run` + `advance_schedule`.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed,
}

impl JobOutcome {
    pub fn status_str(&self) -> &'static str {
        match self.status {
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }
}

/// Filters a batch of candidate schedules down to those actually due at
/// `now` — a defensive re-check even though the repo query already filters,
/// since the worker may hold a batch across a slow tick.
pub fn due_now<'a>(
    schedules: &'a [BackgroundJobSchedule],
    now: DateTime<Utc>,
) -> Vec<&'a BackgroundJobSchedule> {
    schedules.iter().filter(|s| s.is_due(now)).collect()
}

/// Surfaces schedules that are overdue by more than the grace period for
/// an Ops-facing signal (spec.md §4.12).
pub fn overdue_now<'a>(
    schedules: &'a [BackgroundJobSchedule],
    now: DateTime<Utc>,
) -> Vec<&'a BackgroundJobSchedule> {
    schedules.iter().filter(|s| s.is_overdue(now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use uuid::Uuid;

    fn schedule(next_run_at: DateTime<Utc>, enabled: bool) -> BackgroundJobSchedule {
        BackgroundJobSchedule {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            job_code: "ai_recompute".to_string(),
            enabled,
            interval_seconds: 3600,
            options_json: json!({}),
            last_run_at: None,
            next_run_at,
        }
    }

    #[test]
    fn due_now_excludes_future_schedules() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        let schedules = vec![
            schedule(now - Duration::minutes(1), true),
            schedule(now + Duration::minutes(1), true),
        ];
        assert_eq!(due_now(&schedules, now).len(), 1);
    }

    #[test]
    fn due_now_excludes_disabled_schedules() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        let schedules = vec![schedule(now - Duration::minutes(1), false)];
        assert!(due_now(&schedules, now).is_empty());
    }

    #[test]
    fn overdue_requires_more_than_five_minutes_late() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 12, 0, 0).unwrap();
        let barely_late = vec![schedule(now - Duration::minutes(4), true)];
        let very_late = vec![schedule(now - Duration::minutes(6), true)];
        assert!(overdue_now(&barely_late, now).is_empty());
        assert_eq!(overdue_now(&very_late, now).len(), 1);
    }
}
