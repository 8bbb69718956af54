use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A global role code, e.g. `AR`, `AP`, `INVENTORY`, `GRNI`, `COGS`,
/// `SHRINKAGE`, `ROUNDING`, `OPENING_BALANCE`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AccountRole {
    pub code: String,
    pub description: String,
}

/// A postable chart-of-accounts row for one company.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoaAccount {
    pub id: Uuid,
    pub company_id: Uuid,
    pub account_code: String,
    pub name_en: String,
    pub normal_balance: String,
    pub is_postable: bool,
}

/// The per-company role→account mapping maintained by the account
/// defaults resolver (C3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyAccountDefault {
    pub company_id: Uuid,
    pub role_code: String,
    pub account_id: Uuid,
}
