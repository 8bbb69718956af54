use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DocumentAttachment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub storage_key: String,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ImportLineStatus {
    Pending,
    Resolved,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierInvoiceImportLine {
    pub id: Uuid,
    pub supplier_invoice_id: Uuid,
    pub supplier_item_code: Option<String>,
    pub supplier_item_name: Option<String>,
    pub qty: Decimal,
    pub unit_cost_usd: Decimal,
    pub unit_cost_lbp: Decimal,
    pub suggested_item_id: Option<Uuid>,
    pub suggested_confidence: Option<Decimal>,
    pub resolved_item_id: Option<Uuid>,
    pub status: String,
}

/// One line of raw extraction output from the external structured-
/// extraction capability (or the deterministic mock path in dev).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLine {
    pub supplier_item_code: Option<String>,
    pub supplier_item_name: Option<String>,
    pub qty: Decimal,
    pub unit_cost_usd: Decimal,
    pub unit_cost_lbp: Decimal,
}
