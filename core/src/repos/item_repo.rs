//! Item master, UOM conversions, supplier aliasing, and warehouse lookups.

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::item::{Item, ItemSupplier, ItemUomConversion, SupplierItemAlias, Warehouse, WarehouseLocation};

pub async fn find_item(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    item_id: Uuid,
) -> Result<Option<Item>, sqlx::Error> {
    sqlx::query_as::<_, Item>(
        r#"
        SELECT id, company_id, sku, unit_of_measure, track_batches, track_expiry,
               default_shelf_life_days, allow_negative_stock, min_shelf_life_days_for_sale,
               reorder_point, reorder_qty, primary_tax_code
        FROM items
        WHERE company_id = $1 AND id = $2
        "#,
    )
    .bind(company_id)
    .bind(item_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn find_active_conversion(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    uom_code: &str,
) -> Result<Option<ItemUomConversion>, sqlx::Error> {
    sqlx::query_as::<_, ItemUomConversion>(
        "SELECT item_id, uom_code, to_base_factor, is_active FROM item_uom_conversions WHERE item_id = $1 AND uom_code = $2 AND is_active = true",
    )
    .bind(item_id)
    .bind(uom_code)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn find_location(
    tx: &mut Transaction<'_, Postgres>,
    warehouse_id: Uuid,
    location_id: Uuid,
) -> Result<Option<WarehouseLocation>, sqlx::Error> {
    sqlx::query_as::<_, WarehouseLocation>(
        "SELECT id, warehouse_id, code, is_active FROM warehouse_locations WHERE warehouse_id = $1 AND id = $2",
    )
    .bind(warehouse_id)
    .bind(location_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn find_warehouse(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    warehouse_id: Uuid,
) -> Result<Option<Warehouse>, sqlx::Error> {
    sqlx::query_as::<_, Warehouse>(
        "SELECT id, company_id, name FROM warehouses WHERE company_id = $1 AND id = $2",
    )
    .bind(company_id)
    .bind(warehouse_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn upsert_item_supplier_cost(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    supplier_id: Uuid,
    last_cost_usd: Decimal,
    last_cost_lbp: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO item_suppliers (item_id, supplier_id, last_cost_usd, last_cost_lbp)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (item_id, supplier_id)
        DO UPDATE SET last_cost_usd = $3, last_cost_lbp = $4
        "#,
    )
    .bind(item_id)
    .bind(supplier_id)
    .bind(last_cost_usd)
    .bind(last_cost_lbp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[allow(dead_code)]
pub async fn find_item_supplier(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    supplier_id: Uuid,
) -> Result<Option<ItemSupplier>, sqlx::Error> {
    sqlx::query_as::<_, ItemSupplier>(
        "SELECT item_id, supplier_id, last_cost_usd, last_cost_lbp FROM item_suppliers WHERE item_id = $1 AND supplier_id = $2",
    )
    .bind(item_id)
    .bind(supplier_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn upsert_supplier_item_alias(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    supplier_id: Uuid,
    normalized_code: Option<&str>,
    normalized_name: Option<&str>,
    item_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO supplier_item_aliases (company_id, supplier_id, normalized_code, normalized_name, item_id)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (company_id, supplier_id, normalized_code, normalized_name)
        DO UPDATE SET item_id = $5
        "#,
    )
    .bind(company_id)
    .bind(supplier_id)
    .bind(normalized_code)
    .bind(normalized_name)
    .bind(item_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Fuzzy fallback for the import pipeline when no supplier-specific alias
/// has been learned yet: matches the supplier's item code or name directly
/// against a normalized SKU, case/whitespace-insensitively.
pub async fn find_item_by_normalized_sku(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    normalized_code: &str,
) -> Result<Option<Item>, sqlx::Error> {
    sqlx::query_as::<_, Item>(
        r#"
        SELECT id, company_id, sku, unit_of_measure, track_batches, track_expiry,
               default_shelf_life_days, allow_negative_stock, min_shelf_life_days_for_sale,
               reorder_point, reorder_qty, primary_tax_code
        FROM items
        WHERE company_id = $1 AND lower(regexp_replace(sku, '\s+', '', 'g')) = $2
        LIMIT 1
        "#,
    )
    .bind(company_id)
    .bind(normalized_code)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn find_alias_match(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    supplier_id: Uuid,
    normalized_code: Option<&str>,
    normalized_name: Option<&str>,
) -> Result<Option<SupplierItemAlias>, sqlx::Error> {
    sqlx::query_as::<_, SupplierItemAlias>(
        r#"
        SELECT company_id, supplier_id, normalized_code, normalized_name, item_id
        FROM supplier_item_aliases
        WHERE company_id = $1 AND supplier_id = $2
          AND (normalized_code IS NOT NULL AND normalized_code = $3
               OR normalized_name IS NOT NULL AND normalized_name = $4)
        LIMIT 1
        "#,
    )
    .bind(company_id)
    .bind(supplier_id)
    .bind(normalized_code)
    .bind(normalized_name)
    .fetch_optional(&mut **tx)
    .await
}
