use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tenant root. Deletion is not supported (spec.md §3) — there is
/// deliberately no `delete_company` anywhere in this crate.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub base_currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum RateType {
    Official,
    Market,
    Internal,
}

impl std::fmt::Display for RateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RateType::Official => "official",
            RateType::Market => "market",
            RateType::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExchangeRate {
    pub id: Uuid,
    pub company_id: Uuid,
    pub rate_date: NaiveDate,
    pub rate_type: String,
    pub usd_to_lbp: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PeriodLock {
    pub id: Uuid,
    pub company_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub locked: bool,
}
