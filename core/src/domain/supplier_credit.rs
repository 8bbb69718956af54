use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum CreditKind {
    Expense,
    Receipt,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierCreditNote {
    pub id: Uuid,
    pub company_id: Uuid,
    pub supplier_id: Uuid,
    pub kind: String,
    pub goods_receipt_id: Option<Uuid>,
    pub credit_no: Option<String>,
    pub total_usd: Decimal,
    pub total_lbp: Decimal,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierCreditAllocation {
    pub id: Uuid,
    pub credit_note_id: Uuid,
    pub goods_receipt_line_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub alloc_usd: Decimal,
    pub alloc_lbp: Decimal,
    pub inventory_usd: Decimal,
    pub inventory_lbp: Decimal,
    pub cogs_usd: Decimal,
    pub cogs_lbp: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierCreditApplication {
    pub id: Uuid,
    pub credit_note_id: Uuid,
    pub supplier_invoice_id: Uuid,
    pub amount_usd: Decimal,
    pub amount_lbp: Decimal,
}

/// One receipt line's share of a receipt-linked credit, the raw input to
/// the on-hand/sold split described in spec.md §4.9.
#[derive(Debug, Clone)]
pub struct ReceiptLineForCredit {
    pub goods_receipt_line_id: Uuid,
    pub batch_id: Option<Uuid>,
    pub line_value_usd: Decimal,
    pub line_value_lbp: Decimal,
    pub line_qty: Decimal,
    pub on_hand_qty: Decimal,
}
