//! Backs C2 (period locks) and C3 (account-role defaults).

use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::account::{CoaAccount, CompanyAccountDefault};
use crate::domain::PeriodLock;

pub async fn find_lock_covering(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    date: NaiveDate,
) -> Result<Option<PeriodLock>, sqlx::Error> {
    sqlx::query_as::<_, PeriodLock>(
        r#"
        SELECT id, company_id, start_date, end_date, locked
        FROM accounting_period_locks
        WHERE company_id = $1 AND locked = true AND $2 BETWEEN start_date AND end_date
        LIMIT 1
        "#,
    )
    .bind(company_id)
    .bind(date)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn known_role_codes(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT code FROM account_roles")
        .fetch_all(&mut **tx)
        .await
}

pub async fn load_company_defaults(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
) -> Result<Vec<CompanyAccountDefault>, sqlx::Error> {
    sqlx::query_as::<_, CompanyAccountDefault>(
        "SELECT company_id, role_code, account_id FROM company_account_defaults WHERE company_id = $1",
    )
    .bind(company_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn find_postable_by_codes(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    codes: &[&str],
) -> Result<Option<Uuid>, sqlx::Error> {
    for code in codes {
        let found: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM company_coa_accounts WHERE company_id = $1 AND account_code = $2 AND is_postable = true LIMIT 1",
        )
        .bind(company_id)
        .bind(code)
        .fetch_optional(&mut **tx)
        .await?;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

/// Idempotently creates the synthetic opening-balance-equity account
/// (code `1099`) and returns its id.
pub async fn ensure_opening_balance_account(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO company_coa_accounts (id, company_id, account_code, name_en, normal_balance, is_postable)
        VALUES (gen_random_uuid(), $1, '1099', 'OPENING BALANCE EQUITY', 'credit', true)
        ON CONFLICT (company_id, account_code) DO NOTHING
        "#,
    )
    .bind(company_id)
    .execute(&mut **tx)
    .await?;

    sqlx::query_scalar("SELECT id FROM company_coa_accounts WHERE company_id = $1 AND account_code = '1099'")
        .bind(company_id)
        .fetch_one(&mut **tx)
        .await
}

/// Inserts the mapping if absent; returns `true` if a row was written (so
/// the caller knows whether to emit an audit entry). Never overwrites.
pub async fn set_default_if_absent(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    role_code: &str,
    account_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO company_account_defaults (company_id, role_code, account_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (company_id, role_code) DO NOTHING
        "#,
    )
    .bind(company_id)
    .bind(role_code)
    .bind(account_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn account_for_role(
    pool: &PgPool,
    company_id: Uuid,
    role_code: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT account_id FROM company_account_defaults WHERE company_id = $1 AND role_code = $2",
    )
    .bind(company_id)
    .bind(role_code)
    .fetch_optional(pool)
    .await
}

#[allow(dead_code)]
pub async fn fetch_account(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<CoaAccount>, sqlx::Error> {
    sqlx::query_as::<_, CoaAccount>(
        "SELECT id, company_id, account_code, name_en, normal_balance, is_postable FROM company_coa_accounts WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}
