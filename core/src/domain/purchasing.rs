use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum DocStatus {
    Draft,
    Posted,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocSubtype {
    Standard,
    OpeningBalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportStatus {
    None,
    Pending,
    Processing,
    PendingReview,
    Filled,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub company_id: Uuid,
    pub supplier_id: Uuid,
    pub order_no: Option<String>,
    pub status: String,
    pub exchange_rate: Decimal,
    pub order_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseOrderLine {
    pub id: Uuid,
    pub purchase_order_id: Uuid,
    pub item_id: Uuid,
    pub qty_ordered: Decimal,
    pub unit_cost_usd: Decimal,
    pub unit_cost_lbp: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GoodsReceipt {
    pub id: Uuid,
    pub company_id: Uuid,
    pub purchase_order_id: Option<Uuid>,
    pub supplier_id: Uuid,
    pub warehouse_id: Uuid,
    pub receipt_no: Option<String>,
    pub status: String,
    pub exchange_rate: Decimal,
    pub receipt_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GoodsReceiptLine {
    pub id: Uuid,
    pub goods_receipt_id: Uuid,
    pub purchase_order_line_id: Option<Uuid>,
    pub item_id: Uuid,
    pub location_id: Uuid,
    pub qty_received: Decimal,
    pub unit_cost_usd: Decimal,
    pub unit_cost_lbp: Decimal,
    pub batch_no: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierInvoice {
    pub id: Uuid,
    pub company_id: Uuid,
    pub goods_receipt_id: Option<Uuid>,
    pub supplier_id: Uuid,
    pub invoice_no: Option<String>,
    pub status: String,
    pub doc_subtype: String,
    pub is_on_hold: bool,
    pub hold_reason: Option<String>,
    pub hold_details: Option<serde_json::Value>,
    pub import_status: String,
    pub tax_code: Option<String>,
    pub exchange_rate: Decimal,
    pub invoice_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierInvoiceLine {
    pub id: Uuid,
    pub supplier_invoice_id: Uuid,
    pub goods_receipt_line_id: Option<Uuid>,
    pub item_id: Uuid,
    pub qty: Decimal,
    pub unit_cost_usd: Decimal,
    pub unit_cost_lbp: Decimal,
    pub line_total_usd: Decimal,
    pub line_total_lbp: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierPayment {
    pub id: Uuid,
    pub supplier_invoice_id: Uuid,
    pub amount_usd: Decimal,
    pub amount_lbp: Decimal,
    pub payment_method: String,
}

/// Thresholds for the AP 3-way match, company-configurable via the
/// `ap_3way_match` company setting. Defaults match spec.md §4.8.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApThreeWayThresholds {
    pub pct_threshold: Decimal,
    pub abs_usd_threshold: Decimal,
    pub abs_lbp_threshold: Decimal,
    pub tax_diff_pct_threshold: Decimal,
    pub tax_diff_lbp_threshold: Decimal,
    pub qty_epsilon: Decimal,
}

impl Default for ApThreeWayThresholds {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            pct_threshold: dec!(0.15),
            abs_usd_threshold: dec!(25),
            abs_lbp_threshold: dec!(2_500_000),
            tax_diff_pct_threshold: dec!(0.02),
            tax_diff_lbp_threshold: dec!(500_000),
            qty_epsilon: dec!(0.000001),
        }
    }
}

/// One 3-way-match variance flag, serialized verbatim into
/// `SupplierInvoice.hold_details.flags[]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchFlag {
    QtyExceedsReceived {
        goods_receipt_line_id: Uuid,
        invoiced_qty: Decimal,
        received_qty: Decimal,
    },
    UnitCostVariance {
        goods_receipt_line_id: Uuid,
        expected_usd: Decimal,
        actual_usd: Decimal,
        expected_lbp: Decimal,
        actual_lbp: Decimal,
        pct: Option<Decimal>,
    },
    TaxVariance {
        expected_tax_lbp: Decimal,
        actual_tax_lbp: Decimal,
        diff_lbp: Decimal,
        pct: Decimal,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HoldDetails {
    pub flags: Vec<MatchFlag>,
}
