use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Fixed set of agent codes permitted to execute actions autonomously.
/// Every other agent code is review-only (spec.md §4.11).
pub const EXECUTABLE_AGENT_CODES: &[&str] = &["AI_PURCHASE", "AI_DEMAND", "AI_PRICING"];

pub fn is_executable_agent(agent_code: &str) -> bool {
    EXECUTABLE_AGENT_CODES.contains(&agent_code)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RecommendationStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiRecommendation {
    pub id: Uuid,
    pub company_id: Uuid,
    pub agent_code: String,
    pub recommendation_json: serde_json::Value,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ActionStatus {
    Approved,
    Queued,
    Executing,
    Executed,
    Failed,
    Blocked,
    Canceled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiAction {
    pub id: Uuid,
    pub company_id: Uuid,
    pub recommendation_id: Uuid,
    pub agent_code: String,
    pub status: String,
    pub attempt_count: i32,
    pub error_message: Option<String>,
    pub amount_usd: Option<Decimal>,
    pub result_entity_type: Option<String>,
    pub result_entity_id: Option<String>,
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiAgentSetting {
    pub company_id: Uuid,
    pub agent_code: String,
    pub auto_execute: bool,
    pub max_amount_usd: Decimal,
    pub max_actions_per_day: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn rank(self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn max(self, other: Severity) -> Severity {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }
}

/// The deterministic, UI-friendly projection of `recommendation_json`
/// (spec.md §4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationView {
    pub kind: String,
    pub title: String,
    pub summary: String,
    pub next_step: Option<String>,
    pub severity: Severity,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub link_href: Option<String>,
    pub link_label: Option<String>,
    pub details: Vec<serde_json::Value>,
}
