//! Backs C7 (GL posting engine). Journals are append-only: posting inserts
//! a journal + its entries in one statement batch; reversal inserts a new
//! journal rather than mutating the original, mirroring `gl-rs`'s
//! `journal_repo`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::gl::{GlEntry, GlEntryDraft, GlJournal, JournalTemplate, RecurringJournalRule, TaxLine};

#[allow(clippy::too_many_arguments)]
pub async fn insert_journal(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    journal_no: &str,
    source_type: &str,
    source_id: &str,
    journal_date: NaiveDate,
    rate_type: &str,
    exchange_rate: Decimal,
    memo: Option<&str>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO gl_journals
            (id, company_id, journal_no, source_type, source_id, journal_date, rate_type, exchange_rate, memo)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(journal_no)
    .bind(source_type)
    .bind(source_id)
    .bind(journal_date)
    .bind(rate_type)
    .bind(exchange_rate)
    .bind(memo)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn insert_entries(
    tx: &mut Transaction<'_, Postgres>,
    journal_id: Uuid,
    entries: &[GlEntryDraft],
) -> Result<(), sqlx::Error> {
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO gl_entries
                (id, journal_id, account_id, debit_usd, credit_usd, debit_lbp, credit_lbp, memo, warehouse_id, cost_center, project)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(journal_id)
        .bind(entry.account_id)
        .bind(entry.debit_usd)
        .bind(entry.credit_usd)
        .bind(entry.debit_lbp)
        .bind(entry.credit_lbp)
        .bind(&entry.memo)
        .bind(entry.warehouse_id)
        .bind(&entry.cost_center)
        .bind(&entry.project)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn find_journal_by_source(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    source_type: &str,
    source_id: &str,
) -> Result<Option<GlJournal>, sqlx::Error> {
    sqlx::query_as::<_, GlJournal>(
        r#"
        SELECT id, company_id, journal_no, source_type, source_id, journal_date, rate_type, exchange_rate, memo
        FROM gl_journals
        WHERE company_id = $1 AND source_type = $2 AND source_id = $3
        "#,
    )
    .bind(company_id)
    .bind(source_type)
    .bind(source_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn entries_for_journal(
    tx: &mut Transaction<'_, Postgres>,
    journal_id: Uuid,
) -> Result<Vec<GlEntry>, sqlx::Error> {
    sqlx::query_as::<_, GlEntry>(
        "SELECT id, journal_id, account_id, debit_usd, credit_usd, debit_lbp, credit_lbp, memo FROM gl_entries WHERE journal_id = $1",
    )
    .bind(journal_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn insert_tax_line(
    tx: &mut Transaction<'_, Postgres>,
    line: &TaxLine,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO tax_lines (id, company_id, source_type, source_id, tax_code, base_usd, base_lbp, tax_usd, tax_lbp, tax_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(line.id)
    .bind(line.company_id)
    .bind(&line.source_type)
    .bind(&line.source_id)
    .bind(&line.tax_code)
    .bind(line.base_usd)
    .bind(line.base_lbp)
    .bind(line.tax_usd)
    .bind(line.tax_lbp)
    .bind(line.tax_date)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn tax_lines_for_source(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    source_type: &str,
    source_id: &str,
) -> Result<Vec<TaxLine>, sqlx::Error> {
    sqlx::query_as::<_, TaxLine>(
        r#"
        SELECT id, company_id, source_type, source_id, tax_code, base_usd, base_lbp, tax_usd, tax_lbp, tax_date
        FROM tax_lines
        WHERE company_id = $1 AND source_type = $2 AND source_id = $3
        "#,
    )
    .bind(company_id)
    .bind(source_type)
    .bind(source_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn find_template(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    template_id: Uuid,
) -> Result<Option<JournalTemplate>, sqlx::Error> {
    sqlx::query_as::<_, JournalTemplate>(
        "SELECT id, company_id, name FROM gl_journal_templates WHERE company_id = $1 AND id = $2",
    )
    .bind(company_id)
    .bind(template_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn due_recurring_rules(
    pool: &PgPool,
    company_id: Uuid,
    on_date: NaiveDate,
) -> Result<Vec<RecurringJournalRule>, sqlx::Error> {
    sqlx::query_as::<_, RecurringJournalRule>(
        r#"
        SELECT id, company_id, template_id, cadence_kind, day_of_week, day_of_month, next_run_date, is_active
        FROM gl_recurring_journal_rules
        WHERE company_id = $1 AND is_active = true AND next_run_date <= $2
        "#,
    )
    .bind(company_id)
    .bind(on_date)
    .fetch_all(pool)
    .await
}

pub async fn advance_recurring_rule(
    tx: &mut Transaction<'_, Postgres>,
    rule_id: Uuid,
    next_run_date: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE gl_recurring_journal_rules SET next_run_date = $1 WHERE id = $2")
        .bind(next_run_date)
        .bind(rule_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    // Query shape is exercised through `services::gl_posting`'s integration
    // tests against a live database; this module stays thin by design.
}
