//! Account Defaults Resolver (C3).
//!
//! Self-heals missing company↔role account mappings on demand. Grounded
//! directly on `account_defaults.py`'s `ensure_company_account_defaults`:
//! the role list, fallback chains, and code-candidate table below are
//! transcribed from that source rather than invented.

use uuid::Uuid;

use crate::context::Ctx;
use crate::domain::account::CompanyAccountDefault;
use crate::error::CoreResult;
use crate::repos::account_repo;

/// Roles the resolver is allowed to self-heal. Anything not in this list
/// must be mapped explicitly by a company admin.
pub const AUTO_HEAL_ROLES: &[&str] = &[
    "AR",
    "AP",
    "CASH",
    "BANK",
    "SALES",
    "SALES_RETURNS",
    "VAT_PAYABLE",
    "VAT_RECOVERABLE",
    "INVENTORY",
    "COGS",
    "INV_ADJ",
    "SHRINKAGE",
    "ROUNDING",
    "OPENING_STOCK",
    "OPENING_BALANCE",
    "GRNI",
    "INTERCO_AR",
    "INTERCO_AP",
    "PURCHASES_EXPENSE",
];

/// When a role itself has no code candidate match, try these roles'
/// mappings instead (in order) before giving up.
fn role_fallbacks(role: &str) -> &'static [&'static str] {
    match role {
        "SHRINKAGE" => &["INV_ADJ"],
        "ROUNDING" => &["INV_ADJ", "SHRINKAGE"],
        "OPENING_STOCK" => &["OPENING_BALANCE", "INV_ADJ"],
        "OPENING_BALANCE" => &["OPENING_STOCK", "INV_ADJ"],
        _ => &[],
    }
}

/// Candidate chart-of-accounts codes to search for, in priority order,
/// for each auto-healable role.
fn role_account_code_candidates(role: &str) -> &'static [&'static str] {
    match role {
        "AR" => &["4111"],
        "AP" => &["4011"],
        "CASH" => &["1000", "1001"],
        "BANK" => &["1010", "1011"],
        "SALES" => &["5000"],
        "SALES_RETURNS" => &["5010"],
        "VAT_PAYABLE" => &["4021"],
        "VAT_RECOVERABLE" => &["1310"],
        "INVENTORY" => &["3700"],
        "COGS" => &["6011", "6010", "6000"],
        "INV_ADJ" => &["6050"],
        "SHRINKAGE" => &["6055"],
        "ROUNDING" => &["6090"],
        "GRNI" => &["4018", "4011"],
        "INTERCO_AR" => &["4120"],
        "INTERCO_AP" => &["4020"],
        "PURCHASES_EXPENSE" => &["6001"],
        "OPENING_STOCK" | "OPENING_BALANCE" => &["1099"],
        _ => &[],
    }
}

/// Result of one resolver pass: which roles were newly filled, and which
/// auto-healable roles remain unmapped (no candidate code exists yet in
/// the company's chart of accounts).
#[derive(Debug, Clone, Default)]
pub struct AccountDefaultsResult {
    pub filled: Vec<String>,
    pub still_missing: Vec<String>,
}

/// Runs the self-heal pass for every role in [`AUTO_HEAL_ROLES`] that the
/// company doesn't already have mapped. Never overwrites an existing
/// mapping. Emits one audit row per newly-filled role.
pub async fn ensure_company_account_defaults(
    ctx: &Ctx,
) -> CoreResult<AccountDefaultsResult> {
    let mut tx = ctx.begin().await?;
    let existing = account_repo::load_company_defaults(&mut tx, ctx.company_id).await?;
    let mapped: std::collections::HashSet<&str> =
        existing.iter().map(|d| d.role_code.as_str()).collect();

    let mut result = AccountDefaultsResult::default();

    for role in AUTO_HEAL_ROLES {
        if mapped.contains(role) {
            continue;
        }
        match resolve_one(&mut tx, ctx.company_id, role).await? {
            Some(account_id) => {
                let inserted =
                    account_repo::set_default_if_absent(&mut tx, ctx.company_id, role, account_id)
                        .await?;
                if inserted {
                    platform_audit::record(
                        &mut tx,
                        ctx.company_id,
                        ctx.user_id,
                        "config.account_default.autofill",
                        "company_account_default",
                        role,
                        serde_json::json!({ "role_code": role, "account_id": account_id }),
                    )
                    .await?;
                    result.filled.push(role.to_string());
                }
            }
            None => result.still_missing.push(role.to_string()),
        }
    }

    tx.commit().await?;
    Ok(result)
}

async fn resolve_one(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    company_id: Uuid,
    role: &str,
) -> CoreResult<Option<Uuid>> {
    if let Some(id) =
        find_by_candidates(tx, company_id, role_account_code_candidates(role)).await?
    {
        return Ok(Some(id));
    }

    for fallback_role in role_fallbacks(role) {
        if let Some(id) = find_by_candidates(
            tx,
            company_id,
            role_account_code_candidates(fallback_role),
        )
        .await?
        {
            return Ok(Some(id));
        }
    }

    if matches!(role, "OPENING_STOCK" | "OPENING_BALANCE") {
        return Ok(Some(
            account_repo::ensure_opening_balance_account(tx, company_id).await?,
        ));
    }

    Ok(None)
}

async fn find_by_candidates(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    company_id: Uuid,
    codes: &[&str],
) -> CoreResult<Option<Uuid>> {
    if codes.is_empty() {
        return Ok(None);
    }
    Ok(account_repo::find_postable_by_codes(tx, company_id, codes).await?)
}

/// Looks up the account currently mapped to `role_code`, failing with
/// [`CoreError::MissingConfig`](crate::error::CoreError::MissingConfig) if
/// none exists. Posting paths call this rather than resolving inline.
pub async fn account_for_role(ctx: &Ctx, role_code: &str) -> CoreResult<Uuid> {
    account_repo::account_for_role(ctx.pool(), ctx.company_id, role_code)
        .await?
        .ok_or_else(|| {
            crate::error::CoreError::MissingConfig(format!(
                "no account mapped to role '{role_code}' for this company"
            ))
        })
}

#[allow(dead_code)]
fn as_default(d: &CompanyAccountDefault) -> (Uuid, &str) {
    (d.account_id, d.role_code.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_falls_back_to_inv_adj_then_shrinkage() {
        assert_eq!(role_fallbacks("ROUNDING"), &["INV_ADJ", "SHRINKAGE"]);
    }

    #[test]
    fn opening_balance_and_opening_stock_cross_fall_back() {
        assert_eq!(role_fallbacks("OPENING_STOCK"), &["OPENING_BALANCE", "INV_ADJ"]);
        assert_eq!(role_fallbacks("OPENING_BALANCE"), &["OPENING_STOCK", "INV_ADJ"]);
    }

    #[test]
    fn every_auto_heal_role_has_a_candidate_list_or_is_opening() {
        for role in AUTO_HEAL_ROLES {
            let candidates = role_account_code_candidates(role);
            assert!(
                !candidates.is_empty(),
                "role {role} has no code candidates configured"
            );
        }
    }

    #[test]
    fn cogs_tries_three_codes_in_priority_order() {
        assert_eq!(
            role_account_code_candidates("COGS"),
            &["6011", "6010", "6000"]
        );
    }

    #[test]
    fn unknown_role_has_no_candidates_and_no_fallback() {
        assert!(role_account_code_candidates("NOT_A_ROLE").is_empty());
        assert!(role_fallbacks("NOT_A_ROLE").is_empty());
    }
}
