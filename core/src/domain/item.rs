use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub company_id: Uuid,
    pub sku: String,
    pub unit_of_measure: String,
    pub track_batches: bool,
    pub track_expiry: bool,
    pub default_shelf_life_days: Option<i32>,
    pub allow_negative_stock: bool,
    pub min_shelf_life_days_for_sale: Option<i32>,
    pub reorder_point: Decimal,
    pub reorder_qty: Decimal,
    pub primary_tax_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ItemUomConversion {
    pub item_id: Uuid,
    pub uom_code: String,
    pub to_base_factor: Decimal,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ItemWarehouseCost {
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    pub on_hand_qty: Decimal,
    pub avg_cost_usd: Decimal,
    pub avg_cost_lbp: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ItemSupplier {
    pub item_id: Uuid,
    pub supplier_id: Uuid,
    pub last_cost_usd: Decimal,
    pub last_cost_lbp: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupplierItemAlias {
    pub company_id: Uuid,
    pub supplier_id: Uuid,
    pub normalized_code: Option<String>,
    pub normalized_name: Option<String>,
    pub item_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Warehouse {
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WarehouseLocation {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub code: String,
    pub is_active: bool,
}
