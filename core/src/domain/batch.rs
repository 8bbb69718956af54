use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum BatchStatus {
    Available,
    Quarantine,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Batch {
    pub id: Uuid,
    pub item_id: Uuid,
    pub batch_no: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub status: String,
    pub hold_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub received_at: Option<DateTime<Utc>>,
    pub received_source_type: Option<String>,
    pub received_source_id: Option<String>,
    pub received_supplier_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockMove {
    pub id: Uuid,
    pub company_id: Uuid,
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    pub location_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub qty_in: Decimal,
    pub qty_out: Decimal,
    pub unit_cost_usd: Decimal,
    pub unit_cost_lbp: Decimal,
    pub move_date: NaiveDate,
    pub source_type: String,
    pub source_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BatchCostLayer {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub warehouse_id: Uuid,
    pub location_id: Option<Uuid>,
    pub source_type: String,
    pub source_id: String,
    pub source_line_id: String,
    pub qty: Decimal,
    pub unit_cost_usd: Decimal,
    pub unit_cost_lbp: Decimal,
    pub landed_cost_total_usd: Decimal,
    pub landed_cost_total_lbp: Decimal,
    pub rebate_total_usd: Decimal,
    pub rebate_total_lbp: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryCostAdjustment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    pub source_type: String,
    pub source_id: String,
    pub delta_avg_cost_usd: Decimal,
    pub delta_avg_cost_lbp: Decimal,
}

/// One candidate batch considered during FEFO allocation — just enough to
/// order and allocate against, not the full row.
#[derive(Debug, Clone)]
pub struct FefoCandidate {
    pub batch_id: Uuid,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub status: BatchStatus,
    pub on_hand_qty: Decimal,
}

/// Result of allocating a quantity across one or more batches.
#[derive(Debug, Clone, PartialEq)]
pub struct FefoAllocation {
    pub batch_id: Uuid,
    pub qty: Decimal,
}
