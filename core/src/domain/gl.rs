use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GlJournal {
    pub id: Uuid,
    pub company_id: Uuid,
    pub journal_no: String,
    pub source_type: String,
    pub source_id: String,
    pub journal_date: NaiveDate,
    pub rate_type: String,
    pub exchange_rate: Decimal,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlEntryDraft {
    pub account_id: Uuid,
    pub debit_usd: Decimal,
    pub credit_usd: Decimal,
    pub debit_lbp: Decimal,
    pub credit_lbp: Decimal,
    pub memo: Option<String>,
    pub warehouse_id: Option<Uuid>,
    pub cost_center: Option<String>,
    pub project: Option<String>,
}

impl GlEntryDraft {
    pub fn debit(account_id: Uuid, amount: crate::money::DualAmount, memo: impl Into<String>) -> Self {
        Self {
            account_id,
            debit_usd: amount.usd,
            credit_usd: Decimal::ZERO,
            debit_lbp: amount.lbp,
            credit_lbp: Decimal::ZERO,
            memo: Some(memo.into()),
            warehouse_id: None,
            cost_center: None,
            project: None,
        }
    }

    pub fn credit(account_id: Uuid, amount: crate::money::DualAmount, memo: impl Into<String>) -> Self {
        Self {
            account_id,
            debit_usd: Decimal::ZERO,
            credit_usd: amount.usd,
            debit_lbp: Decimal::ZERO,
            credit_lbp: amount.lbp,
            memo: Some(memo.into()),
            warehouse_id: None,
            cost_center: None,
            project: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GlEntry {
    pub id: Uuid,
    pub journal_id: Uuid,
    pub account_id: Uuid,
    pub debit_usd: Decimal,
    pub credit_usd: Decimal,
    pub debit_lbp: Decimal,
    pub credit_lbp: Decimal,
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaxLine {
    pub id: Uuid,
    pub company_id: Uuid,
    pub source_type: String,
    pub source_id: String,
    pub tax_code: String,
    pub base_usd: Decimal,
    pub base_lbp: Decimal,
    pub tax_usd: Decimal,
    pub tax_lbp: Decimal,
    pub tax_date: NaiveDate,
}

impl TaxLine {
    pub fn negated(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id: self.company_id,
            source_type: self.source_type.clone(),
            source_id: self.source_id.clone(),
            tax_code: self.tax_code.clone(),
            base_usd: -self.base_usd,
            base_lbp: -self.base_lbp,
            tax_usd: -self.tax_usd,
            tax_lbp: -self.tax_lbp,
            tax_date: Utc::now().date_naive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurringCadence {
    Daily,
    Weekly(u8),
    Monthly(u8),
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JournalTemplate {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurringJournalRule {
    pub id: Uuid,
    pub company_id: Uuid,
    pub template_id: Uuid,
    pub cadence_kind: String,
    pub day_of_week: i16,
    pub day_of_month: i16,
    pub next_run_date: NaiveDate,
    pub is_active: bool,
}
