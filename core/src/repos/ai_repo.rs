//! Backs C11 (recommendations, actions, per-agent guardrail settings).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::ai::{AiAction, AiAgentSetting, AiRecommendation};

pub async fn find_recommendation(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    id: Uuid,
) -> Result<Option<AiRecommendation>, sqlx::Error> {
    sqlx::query_as::<_, AiRecommendation>(
        "SELECT id, company_id, agent_code, recommendation_json, status FROM ai_recommendations WHERE company_id = $1 AND id = $2 FOR UPDATE",
    )
    .bind(company_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn set_recommendation_status(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE ai_recommendations SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn find_action_by_recommendation(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    recommendation_id: Uuid,
) -> Result<Option<AiAction>, sqlx::Error> {
    sqlx::query_as::<_, AiAction>(
        r#"
        SELECT id, company_id, recommendation_id, agent_code, status, attempt_count, error_message,
               amount_usd, result_entity_type, result_entity_id, executed_at
        FROM ai_actions
        WHERE company_id = $1 AND recommendation_id = $2
        FOR UPDATE
        "#,
    )
    .bind(company_id)
    .bind(recommendation_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn find_action(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    id: Uuid,
) -> Result<Option<AiAction>, sqlx::Error> {
    sqlx::query_as::<_, AiAction>(
        r#"
        SELECT id, company_id, recommendation_id, agent_code, status, attempt_count, error_message,
               amount_usd, result_entity_type, result_entity_id, executed_at
        FROM ai_actions
        WHERE company_id = $1 AND id = $2
        FOR UPDATE
        "#,
    )
    .bind(company_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

/// Upserts by the `(company, recommendation_id)` unique key described in
/// spec.md §4.11/§5: a second `approved` decision on the same recommendation
/// refreshes the existing row rather than creating a duplicate.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_action(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    recommendation_id: Uuid,
    agent_code: &str,
    status: &str,
    amount_usd: Option<Decimal>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO ai_actions
            (id, company_id, recommendation_id, agent_code, status, attempt_count, error_message, amount_usd)
        VALUES ($1, $2, $3, $4, $5, 0, NULL, $6)
        ON CONFLICT (company_id, recommendation_id)
        DO UPDATE SET
            status = $5,
            amount_usd = $6,
            error_message = NULL,
            attempt_count = CASE
                WHEN ai_actions.status IN ('failed', 'blocked', 'canceled') THEN 0
                ELSE ai_actions.attempt_count
            END
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(recommendation_id)
    .bind(agent_code)
    .bind(status)
    .bind(amount_usd)
    .execute(&mut **tx)
    .await?;

    sqlx::query_scalar("SELECT id FROM ai_actions WHERE company_id = $1 AND recommendation_id = $2")
        .bind(company_id)
        .bind(recommendation_id)
        .fetch_one(&mut **tx)
        .await
}

pub async fn set_action_status(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    status: &str,
    error_message: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE ai_actions SET status = $2, error_message = $3 WHERE id = $1")
        .bind(id)
        .bind(status)
        .bind(error_message)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn mark_action_executing(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE ai_actions SET status = 'executing', attempt_count = attempt_count + 1 WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn mark_action_executed(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    result_entity_type: &str,
    result_entity_id: &str,
    executed_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE ai_actions
        SET status = 'executed', result_entity_type = $2, result_entity_id = $3, executed_at = $4, error_message = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(result_entity_type)
    .bind(result_entity_id)
    .bind(executed_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn cancel_actions_for_recommendation(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    recommendation_id: Uuid,
    reason: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE ai_actions SET status = 'canceled', error_message = $3 WHERE company_id = $1 AND recommendation_id = $2",
    )
    .bind(company_id)
    .bind(recommendation_id)
    .bind(reason)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn agent_setting(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    agent_code: &str,
) -> Result<Option<AiAgentSetting>, sqlx::Error> {
    sqlx::query_as::<_, AiAgentSetting>(
        "SELECT company_id, agent_code, auto_execute, max_amount_usd, max_actions_per_day FROM ai_agent_settings WHERE company_id = $1 AND agent_code = $2",
    )
    .bind(company_id)
    .bind(agent_code)
    .fetch_optional(&mut **tx)
    .await
}

/// Count of actions for `agent_code` already executed today, for the
/// `max_actions_per_day` guardrail.
pub async fn executed_count_today(
    pool: &PgPool,
    company_id: Uuid,
    agent_code: &str,
    today: NaiveDate,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM ai_actions
        WHERE company_id = $1 AND agent_code = $2 AND status = 'executed' AND executed_at::date = $3
        "#,
    )
    .bind(company_id)
    .bind(agent_code)
    .bind(today)
    .fetch_one(pool)
    .await
}

pub async fn insert_recommendation(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    agent_code: &str,
    recommendation_json: Value,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO ai_recommendations (id, company_id, agent_code, recommendation_json, status)
        VALUES ($1, $2, $3, $4, 'pending')
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(agent_code)
    .bind(recommendation_json)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    // Query shape only — exercised end to end against a live database.
}
