//! Append-only audit trail shared by every core component.
//!
//! Every mutating core operation that changes tenant state — postings,
//! cancellations, holds, account-default autofills, AI decisions — writes
//! one row here inside the *same* transaction as the state change. Audit is
//! never "fire-and-forget": if the transaction rolls back, the audit row
//! rolls back with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// A single audit entry. `details` is an opaque JSON bag — each writer picks
/// its own schema; audit never interprets it, only stores and returns it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

/// Append one audit row inside the caller's transaction.
///
/// `user_id` is `None` for system-initiated writes (self-heal, background
/// jobs) — callers should not invent a user for those.
#[allow(clippy::too_many_arguments)]
pub async fn record(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    user_id: Option<Uuid>,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    details: Value,
) -> AuditResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, company_id, user_id, action, entity_type, entity_id, details, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(user_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(&details)
    .execute(&mut **tx)
    .await?;

    tracing::info!(
        audit_id = %id,
        company_id = %company_id,
        action = %action,
        entity_type = %entity_type,
        entity_id = %entity_id,
        "audit entry recorded"
    );

    Ok(id)
}

/// Fetch the audit trail for one entity, newest first. Used by review UIs
/// (external) and by tests asserting an autofill/decision was recorded.
pub async fn for_entity(
    pool: &sqlx::PgPool,
    company_id: Uuid,
    entity_type: &str,
    entity_id: &str,
) -> AuditResult<Vec<AuditLog>> {
    let rows = sqlx::query_as::<_, AuditLog>(
        r#"
        SELECT id, company_id, user_id, action, entity_type, entity_id, details, created_at
        FROM audit_logs
        WHERE company_id = $1 AND entity_type = $2 AND entity_id = $3
        ORDER BY created_at DESC
        "#,
    )
    .bind(company_id)
    .bind(entity_type)
    .bind(entity_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_log_serializes_opaque_details() {
        let log = AuditLog {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            user_id: None,
            action: "account_default.autofill".to_string(),
            entity_type: "company_account_defaults".to_string(),
            entity_id: "AR".to_string(),
            details: serde_json::json!({"role": "AR", "account_id": "1100", "strategy": "code_candidate"}),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value["details"]["strategy"], "code_candidate");
    }
}
