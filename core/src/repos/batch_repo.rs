//! Backs C5 (batch identity, cost layers) and C6 (stock moves, avg cost).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::batch::{Batch, BatchCostLayer, FefoCandidate, InventoryCostAdjustment, StockMove};
use crate::domain::item::ItemWarehouseCost;

/// NULL-equal lookup: `batch_no`/`expiry_date` absent on both sides counts
/// as a match, mirroring SQL `IS NOT DISTINCT FROM` semantics.
pub async fn find_batch(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    batch_no: Option<&str>,
    expiry_date: Option<NaiveDate>,
) -> Result<Option<Batch>, sqlx::Error> {
    sqlx::query_as::<_, Batch>(
        r#"
        SELECT id, item_id, batch_no, expiry_date, status, hold_reason, created_at,
               received_at, received_source_type, received_source_id, received_supplier_id
        FROM batches
        WHERE item_id = $1
          AND batch_no IS NOT DISTINCT FROM $2
          AND expiry_date IS NOT DISTINCT FROM $3
        "#,
    )
    .bind(item_id)
    .bind(batch_no)
    .bind(expiry_date)
    .fetch_optional(&mut **tx)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn create_batch(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    batch_no: Option<&str>,
    expiry_date: Option<NaiveDate>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO batches (id, item_id, batch_no, expiry_date, status, created_at)
        VALUES ($1, $2, $3, $4, 'available', NOW())
        "#,
    )
    .bind(id)
    .bind(item_id)
    .bind(batch_no)
    .bind(expiry_date)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

/// Received-metadata fields are write-once: this only touches rows where
/// `received_at IS NULL`, so a batch's first receipt wins permanently.
pub async fn stamp_received_metadata_if_absent(
    tx: &mut Transaction<'_, Postgres>,
    batch_id: Uuid,
    source_type: &str,
    source_id: &str,
    supplier_id: Uuid,
    received_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE batches
        SET received_at = $2, received_source_type = $3, received_source_id = $4, received_supplier_id = $5
        WHERE id = $1 AND received_at IS NULL
        "#,
    )
    .bind(batch_id)
    .bind(received_at)
    .bind(source_type)
    .bind(source_id)
    .bind(supplier_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn fefo_candidates(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    warehouse_id: Uuid,
) -> Result<Vec<FefoCandidate>, sqlx::Error> {
    sqlx::query_as::<_, FefoCandidateRow>(
        r#"
        SELECT b.id AS batch_id, b.expiry_date, b.created_at, b.status,
               COALESCE(SUM(m.qty_in - m.qty_out), 0) AS on_hand_qty
        FROM batches b
        JOIN stock_moves m ON m.batch_id = b.id
        WHERE b.item_id = $1 AND m.warehouse_id = $2
        GROUP BY b.id, b.expiry_date, b.created_at, b.status
        HAVING COALESCE(SUM(m.qty_in - m.qty_out), 0) > 0
        "#,
    )
    .bind(item_id)
    .bind(warehouse_id)
    .fetch_all(&mut **tx)
    .await
    .map(|rows| rows.into_iter().map(Into::into).collect())
}

#[derive(sqlx::FromRow)]
struct FefoCandidateRow {
    batch_id: Uuid,
    expiry_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    status: String,
    on_hand_qty: Decimal,
}

impl From<FefoCandidateRow> for FefoCandidate {
    fn from(row: FefoCandidateRow) -> Self {
        let status = match row.status.as_str() {
            "quarantine" => crate::domain::batch::BatchStatus::Quarantine,
            "expired" => crate::domain::batch::BatchStatus::Expired,
            _ => crate::domain::batch::BatchStatus::Available,
        };
        FefoCandidate {
            batch_id: row.batch_id,
            expiry_date: row.expiry_date,
            created_at: row.created_at,
            status,
            on_hand_qty: row.on_hand_qty,
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_stock_move(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    item_id: Uuid,
    warehouse_id: Uuid,
    location_id: Option<Uuid>,
    batch_id: Option<Uuid>,
    qty_in: Decimal,
    qty_out: Decimal,
    unit_cost_usd: Decimal,
    unit_cost_lbp: Decimal,
    move_date: NaiveDate,
    source_type: &str,
    source_id: &str,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO stock_moves
            (id, company_id, item_id, warehouse_id, location_id, batch_id, qty_in, qty_out,
             unit_cost_usd, unit_cost_lbp, move_date, source_type, source_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(item_id)
    .bind(warehouse_id)
    .bind(location_id)
    .bind(batch_id)
    .bind(qty_in)
    .bind(qty_out)
    .bind(unit_cost_usd)
    .bind(unit_cost_lbp)
    .bind(move_date)
    .bind(source_type)
    .bind(source_id)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn moves_for_source(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    source_type: &str,
    source_id: &str,
) -> Result<Vec<StockMove>, sqlx::Error> {
    sqlx::query_as::<_, StockMove>(
        r#"
        SELECT id, company_id, item_id, warehouse_id, location_id, batch_id, qty_in, qty_out,
               unit_cost_usd, unit_cost_lbp, move_date, source_type, source_id
        FROM stock_moves
        WHERE company_id = $1 AND source_type = $2 AND source_id = $3
        "#,
    )
    .bind(company_id)
    .bind(source_type)
    .bind(source_id)
    .fetch_all(&mut **tx)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_cost_layer(
    tx: &mut Transaction<'_, Postgres>,
    batch_id: Uuid,
    warehouse_id: Uuid,
    location_id: Option<Uuid>,
    source_type: &str,
    source_id: &str,
    source_line_id: &str,
    qty: Decimal,
    unit_cost_usd: Decimal,
    unit_cost_lbp: Decimal,
    landed_cost_total_usd: Decimal,
    landed_cost_total_lbp: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO batch_cost_layers
            (id, batch_id, warehouse_id, location_id, source_type, source_id, source_line_id,
             qty, unit_cost_usd, unit_cost_lbp, landed_cost_total_usd, landed_cost_total_lbp,
             rebate_total_usd, rebate_total_lbp)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 0, 0)
        ON CONFLICT (source_type, source_id, source_line_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(batch_id)
    .bind(warehouse_id)
    .bind(location_id)
    .bind(source_type)
    .bind(source_id)
    .bind(source_line_id)
    .bind(qty)
    .bind(unit_cost_usd)
    .bind(unit_cost_lbp)
    .bind(landed_cost_total_usd)
    .bind(landed_cost_total_lbp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn delete_cost_layers_for_source(
    tx: &mut Transaction<'_, Postgres>,
    source_type: &str,
    source_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM batch_cost_layers WHERE source_type = $1 AND source_id = $2")
        .bind(source_type)
        .bind(source_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// The item a batch belongs to — used to route the supplier-credit
/// avg-cost adjustment back to the right item/warehouse cost row.
pub async fn item_id_for_batch(tx: &mut Transaction<'_, Postgres>, batch_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("SELECT item_id FROM batches WHERE id = $1")
        .bind(batch_id)
        .fetch_optional(&mut **tx)
        .await
}

/// Current on-hand quantity for a single batch, across all warehouses —
/// used by the supplier-credit on-hand/sold split.
pub async fn batch_on_hand_qty(tx: &mut Transaction<'_, Postgres>, batch_id: Uuid) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(SUM(qty_in - qty_out), 0) FROM stock_moves WHERE batch_id = $1")
        .bind(batch_id)
        .fetch_one(&mut **tx)
        .await
}

pub async fn item_warehouse_cost(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    warehouse_id: Uuid,
) -> Result<Option<ItemWarehouseCost>, sqlx::Error> {
    sqlx::query_as::<_, ItemWarehouseCost>(
        "SELECT item_id, warehouse_id, on_hand_qty, avg_cost_usd, avg_cost_lbp FROM item_warehouse_costs WHERE item_id = $1 AND warehouse_id = $2",
    )
    .bind(item_id)
    .bind(warehouse_id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn upsert_item_warehouse_cost(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
    warehouse_id: Uuid,
    on_hand_qty: Decimal,
    avg_cost_usd: Decimal,
    avg_cost_lbp: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO item_warehouse_costs (item_id, warehouse_id, on_hand_qty, avg_cost_usd, avg_cost_lbp)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (item_id, warehouse_id)
        DO UPDATE SET on_hand_qty = $3, avg_cost_usd = $4, avg_cost_lbp = $5
        "#,
    )
    .bind(item_id)
    .bind(warehouse_id)
    .bind(on_hand_qty)
    .bind(avg_cost_usd)
    .bind(avg_cost_lbp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn insert_cost_adjustment(
    tx: &mut Transaction<'_, Postgres>,
    adj: &InventoryCostAdjustment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO inventory_cost_adjustments
            (id, company_id, item_id, warehouse_id, source_type, source_id, delta_avg_cost_usd, delta_avg_cost_lbp)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(adj.id)
    .bind(adj.company_id)
    .bind(adj.item_id)
    .bind(adj.warehouse_id)
    .bind(&adj.source_type)
    .bind(&adj.source_id)
    .bind(adj.delta_avg_cost_usd)
    .bind(adj.delta_avg_cost_lbp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn cost_adjustments_for_source(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    source_type: &str,
    source_id: &str,
) -> Result<Vec<InventoryCostAdjustment>, sqlx::Error> {
    sqlx::query_as::<_, InventoryCostAdjustment>(
        r#"
        SELECT id, company_id, item_id, warehouse_id, source_type, source_id, delta_avg_cost_usd, delta_avg_cost_lbp
        FROM inventory_cost_adjustments
        WHERE company_id = $1 AND source_type = $2 AND source_id = $3
        "#,
    )
    .bind(company_id)
    .bind(source_type)
    .bind(source_id)
    .fetch_all(&mut **tx)
    .await
}
