//! AI Recommendation & Action Pipeline (C11), with guardrails.
//!
//! Grounded in `services::purchasing`'s status-machine shape (posted /
//! canceled transitions guarded by a precondition check) and
//! `journal_utils.py`'s audit-after-mutation ordering. The guardrail gate
//! follows the same "evaluate both limits before acting" pattern as
//! [`crate::services::purchasing::run_three_way_match`].

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::context::Ctx;
use crate::domain::ai::{is_executable_agent, RecommendationView, Severity};
use crate::error::{CoreError, CoreResult};
use crate::repos::ai_repo;

/// Decision made on a pending recommendation: approve (queues an action
/// for executable agents, otherwise just records the decision), or reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

/// Applies a human decision to a pending recommendation. For an
/// executable agent's approval, upserts (or refreshes) the paired action
/// in `queued` status; for a review-only agent, the recommendation status
/// itself is the terminal state.
pub async fn decide_recommendation(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    recommendation_id: Uuid,
    decision: Decision,
) -> CoreResult<()> {
    let recommendation = ai_repo::find_recommendation(tx, ctx.company_id, recommendation_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("recommendation not found".to_string()))?;

    if recommendation.status != "pending" {
        return Err(CoreError::Precondition(
            "recommendation has already been decided".to_string(),
        ));
    }

    match decision {
        Decision::Rejected => {
            ai_repo::set_recommendation_status(tx, recommendation_id, "rejected").await?;
        }
        Decision::Approved => {
            ai_repo::set_recommendation_status(tx, recommendation_id, "approved").await?;

            if is_executable_agent(&recommendation.agent_code) {
                let amount_usd = extract_amount_usd(&recommendation.recommendation_json);
                ai_repo::upsert_action(
                    tx,
                    ctx.company_id,
                    recommendation_id,
                    &recommendation.agent_code,
                    "queued",
                    amount_usd,
                )
                .await?;
            }
        }
    }

    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "ai.recommendation.decide",
        "ai_recommendation",
        &recommendation_id.to_string(),
        serde_json::json!({ "decision": format!("{decision:?}") }),
    )
    .await?;

    Ok(())
}

/// Best-effort extraction of a headline USD amount from a recommendation
/// payload, for the `max_amount_usd` guardrail. Recognizes the
/// conventional `amount_usd` key at the payload root; absent or
/// non-numeric values are treated as "no amount" rather than an error,
/// since not every agent's recommendation carries one.
pub fn extract_amount_usd(recommendation_json: &Value) -> Option<Decimal> {
    recommendation_json
        .get("amount_usd")
        .and_then(|v| v.as_str().and_then(|s| s.parse::<Decimal>().ok()).or_else(|| v.as_f64().and_then(Decimal::from_f64_retain)))
}

/// Manually cancels a queued action before it executes. Any other status
/// is refused — an executing/executed action cannot be undone this way.
pub async fn cancel_action(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    action_id: Uuid,
) -> CoreResult<()> {
    let action = ai_repo::find_action(tx, ctx.company_id, action_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("action not found".to_string()))?;

    if action.status != "queued" {
        return Err(CoreError::Precondition(
            "only a queued action can be canceled".to_string(),
        ));
    }

    ai_repo::set_action_status(tx, action_id, "canceled", None).await?;

    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "ai.action.cancel",
        "ai_action",
        &action_id.to_string(),
        serde_json::json!({}),
    )
    .await?;

    Ok(())
}

/// Re-queues a failed, blocked, or manually-canceled action for another
/// attempt. Resets its error message so the queue is not confused by stale
/// diagnostics from the prior attempt.
pub async fn requeue_action(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    action_id: Uuid,
) -> CoreResult<()> {
    let action = ai_repo::find_action(tx, ctx.company_id, action_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("action not found".to_string()))?;

    if !matches!(action.status.as_str(), "failed" | "blocked" | "canceled") {
        return Err(CoreError::Precondition(
            "only a failed, blocked, or canceled action can be requeued".to_string(),
        ));
    }

    ai_repo::set_action_status(tx, action_id, "queued", None).await?;

    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "ai.action.requeue",
        "ai_action",
        &action_id.to_string(),
        serde_json::json!({}),
    )
    .await?;

    Ok(())
}

/// The outcome of an execution attempt, letting the caller decide whether
/// to emit an outbox event or retry later.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Executed { entity_type: String, entity_id: String },
    Blocked { reason: String },
}

/// Runs one queued action through the guardrail gate and (if it passes)
/// the agent-specific side effect. Guardrails are evaluated in a fixed
/// order — daily action count, then amount — so a blocked action's reason
/// is always deterministic rather than depending on evaluation order.
pub async fn execute_action(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    action_id: Uuid,
) -> CoreResult<ExecutionOutcome> {
    let action = ai_repo::find_action(tx, ctx.company_id, action_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("action not found".to_string()))?;

    if action.status != "queued" {
        return Err(CoreError::Precondition(
            "only a queued action can be executed".to_string(),
        ));
    }

    let settings = ai_repo::agent_setting(tx, ctx.company_id, &action.agent_code).await?;

    if let Some(settings) = &settings {
        let today = Utc::now().date_naive();
        let executed_today = ai_repo::executed_count_today(ctx.pool(), ctx.company_id, &action.agent_code, today).await?;
        if executed_today >= i64::from(settings.max_actions_per_day) {
            let reason = format!(
                "daily action limit reached ({executed_today}/{})",
                settings.max_actions_per_day
            );
            ai_repo::set_action_status(tx, action_id, "blocked", Some(&reason)).await?;
            return Ok(ExecutionOutcome::Blocked { reason });
        }

        if let Some(amount) = action.amount_usd {
            if amount > settings.max_amount_usd {
                let reason = format!(
                    "action amount {amount} exceeds the agent's max_amount_usd {}",
                    settings.max_amount_usd
                );
                ai_repo::set_action_status(tx, action_id, "blocked", Some(&reason)).await?;
                return Ok(ExecutionOutcome::Blocked { reason });
            }
        }
    }

    ai_repo::mark_action_executing(tx, action_id).await?;

    let recommendation = ai_repo::find_recommendation(tx, ctx.company_id, action.recommendation_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("recommendation not found".to_string()))?;

    let side_effect = match run_side_effect(ctx, tx, &action.agent_code, &recommendation.recommendation_json).await {
        Ok(effect) => effect,
        Err(err) => {
            ai_repo::set_action_status(tx, action_id, "failed", Some(&err.to_string())).await?;
            return Err(err);
        }
    };

    ai_repo::mark_action_executed(tx, action_id, &side_effect.entity_type, &side_effect.entity_id, Utc::now()).await?;
    ai_repo::set_recommendation_status(tx, action.recommendation_id, "executed").await?;

    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "ai.action.execute",
        "ai_action",
        &action_id.to_string(),
        serde_json::json!({ "entity_type": side_effect.entity_type, "entity_id": side_effect.entity_id }),
    )
    .await?;

    Ok(ExecutionOutcome::Executed {
        entity_type: side_effect.entity_type,
        entity_id: side_effect.entity_id,
    })
}

struct SideEffect {
    entity_type: String,
    entity_id: String,
}

/// The concrete action each executable agent takes. `AI_DEMAND` and
/// `AI_PRICING` currently only stage a recommendation for manual follow-up
/// once approved (no automated write beyond the action record itself);
/// `AI_PURCHASE` is the one agent with a write side effect defined so far.
async fn run_side_effect(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    agent_code: &str,
    recommendation_json: &Value,
) -> CoreResult<SideEffect> {
    match agent_code {
        "AI_PURCHASE" => {
            let supplier_id = recommendation_json
                .get("supplier_id")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<Uuid>().ok())
                .ok_or_else(|| CoreError::Validation("recommendation is missing supplier_id".to_string()))?;

            let order_no = numbering::next_document_no(tx, ctx.company_id, "purchase_order", "PO-").await?;
            let po_id = crate::repos::purchasing_repo::insert_draft_purchase_order(
                tx,
                ctx.company_id,
                supplier_id,
                Utc::now().date_naive(),
            )
            .await?;

            Ok(SideEffect {
                entity_type: "purchase_order".to_string(),
                entity_id: format!("{po_id}:{order_no}"),
            })
        }
        "AI_DEMAND" | "AI_PRICING" => Ok(SideEffect {
            entity_type: "ai_recommendation".to_string(),
            entity_id: "acknowledged".to_string(),
        }),
        other => Err(CoreError::Validation(format!("agent '{other}' has no executor"))),
    }
}

/// Projects a recommendation row into the deterministic, UI-facing shape
/// described in spec.md §4.11. Unrecognized or missing fields degrade to
/// sane defaults rather than failing the projection outright, since this
/// view is read-only and best-effort by nature.
pub fn project_recommendation_view(agent_code: &str, recommendation_json: &Value) -> RecommendationView {
    let get_str = |key: &str| -> Option<String> {
        recommendation_json.get(key).and_then(|v| v.as_str()).map(str::to_string)
    };

    let severity = recommendation_json
        .get("severity")
        .and_then(|v| v.as_str())
        .map(parse_severity)
        .unwrap_or(Severity::Info);

    let details = recommendation_json
        .get("details")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    RecommendationView {
        kind: get_str("kind").unwrap_or_else(|| agent_code.to_lowercase()),
        title: get_str("title").unwrap_or_else(|| agent_code.to_string()),
        summary: get_str("summary").unwrap_or_default(),
        next_step: get_str("next_step"),
        severity,
        entity_type: get_str("entity_type"),
        entity_id: get_str("entity_id"),
        link_href: get_str("link_href"),
        link_label: get_str("link_label"),
        details,
    }
}

fn parse_severity(raw: &str) -> Severity {
    match raw.to_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Info,
    }
}

/// Rolls several recommendation views into one worst-case severity, for a
/// dashboard summary card.
pub fn rollup_severity(views: &[RecommendationView]) -> Severity {
    views.iter().fold(Severity::Info, |acc, v| acc.max(v.severity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn extracts_amount_from_string_or_number() {
        assert_eq!(
            extract_amount_usd(&serde_json::json!({ "amount_usd": "123.45" })),
            Some(dec!(123.45))
        );
        assert_eq!(
            extract_amount_usd(&serde_json::json!({ "amount_usd": 50 })),
            Some(dec!(50))
        );
        assert_eq!(extract_amount_usd(&serde_json::json!({})), None);
    }

    #[test]
    fn projects_defaults_when_fields_absent() {
        let view = project_recommendation_view("AI_DEMAND", &serde_json::json!({}));
        assert_eq!(view.title, "AI_DEMAND");
        assert_eq!(view.severity, Severity::Info);
        assert!(view.details.is_empty());
    }

    #[test]
    fn projects_configured_severity_case_insensitively() {
        let view = project_recommendation_view("AI_PRICING", &serde_json::json!({ "severity": "HIGH" }));
        assert_eq!(view.severity, Severity::High);
    }

    #[test]
    fn severity_rollup_takes_the_worst_case() {
        let views = vec![
            project_recommendation_view("a", &serde_json::json!({ "severity": "low" })),
            project_recommendation_view("b", &serde_json::json!({ "severity": "critical" })),
            project_recommendation_view("c", &serde_json::json!({ "severity": "medium" })),
        ];
        assert_eq!(rollup_severity(&views), Severity::Critical);
    }

    #[test]
    fn rollup_of_empty_list_is_info() {
        assert_eq!(rollup_severity(&[]), Severity::Info);
    }
}
