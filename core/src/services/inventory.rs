//! Inventory Mutator (C6).
//!
//! Owns stock-move emission and the moving-average cost formula. Every
//! operation here refuses both-zero move quantities, requires batch
//! context for tracked items, and gates on `assert_period_open` for its
//! effective move date — grounded in `inventory/moves.py`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::context::Ctx;
use crate::domain::batch::InventoryCostAdjustment;
use crate::error::{CoreError, CoreResult};
use crate::repos::{batch_repo, item_repo};
use crate::services::period_lock;

/// One side of a stock move: exactly one of `qty_in`/`qty_out` must be
/// positive, the other zero.
#[derive(Debug, Clone, Copy)]
pub struct MoveQuantities {
    pub qty_in: Decimal,
    pub qty_out: Decimal,
}

impl MoveQuantities {
    pub fn inbound(qty: Decimal) -> Self {
        Self {
            qty_in: qty,
            qty_out: Decimal::ZERO,
        }
    }

    pub fn outbound(qty: Decimal) -> Self {
        Self {
            qty_in: Decimal::ZERO,
            qty_out: qty,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        let in_positive = self.qty_in > Decimal::ZERO;
        let out_positive = self.qty_out > Decimal::ZERO;
        if in_positive == out_positive {
            return Err(CoreError::Validation(
                "stock move requires exactly one of qty_in/qty_out to be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// The standard moving-average formula: inbound moves blend the new unit
/// cost into the running average weighted by quantity; outbound moves
/// leave the average untouched and simply reduce on-hand quantity.
pub fn moving_average_update(
    on_hand_qty: Decimal,
    avg_cost_usd: Decimal,
    avg_cost_lbp: Decimal,
    moves: MoveQuantities,
    unit_cost_usd: Decimal,
    unit_cost_lbp: Decimal,
) -> (Decimal, Decimal, Decimal) {
    if moves.qty_in > Decimal::ZERO {
        let new_on_hand = on_hand_qty + moves.qty_in;
        if new_on_hand <= Decimal::ZERO {
            return (new_on_hand, avg_cost_usd, avg_cost_lbp);
        }
        let existing_value_usd = on_hand_qty.max(Decimal::ZERO) * avg_cost_usd;
        let existing_value_lbp = on_hand_qty.max(Decimal::ZERO) * avg_cost_lbp;
        let incoming_value_usd = moves.qty_in * unit_cost_usd;
        let incoming_value_lbp = moves.qty_in * unit_cost_lbp;
        let new_avg_usd = crate::money::q_usd((existing_value_usd + incoming_value_usd) / new_on_hand);
        let new_avg_lbp = crate::money::q_lbp((existing_value_lbp + incoming_value_lbp) / new_on_hand);
        (new_on_hand, new_avg_usd, new_avg_lbp)
    } else {
        (on_hand_qty - moves.qty_out, avg_cost_usd, avg_cost_lbp)
    }
}

/// Orchestrates one stock move: validates quantities, gates on the period
/// lock, inserts the move row, and maintains the item/warehouse moving
/// average. Returns the new cost snapshot.
#[allow(clippy::too_many_arguments)]
pub async fn emit_stock_move(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    item_id: Uuid,
    warehouse_id: Uuid,
    location_id: Option<Uuid>,
    batch_id: Option<Uuid>,
    moves: MoveQuantities,
    unit_cost_usd: Decimal,
    unit_cost_lbp: Decimal,
    move_date: NaiveDate,
    source_type: &str,
    source_id: &str,
) -> CoreResult<(Decimal, Decimal, Decimal)> {
    moves.validate()?;
    period_lock::assert_period_open(ctx, tx, move_date).await?;

    batch_repo::insert_stock_move(
        tx,
        ctx.company_id,
        item_id,
        warehouse_id,
        location_id,
        batch_id,
        moves.qty_in,
        moves.qty_out,
        unit_cost_usd,
        unit_cost_lbp,
        move_date,
        source_type,
        source_id,
    )
    .await?;

    let existing = batch_repo::item_warehouse_cost(tx, item_id, warehouse_id).await?;
    let (on_hand, avg_usd, avg_lbp) = match &existing {
        Some(c) => (c.on_hand_qty, c.avg_cost_usd, c.avg_cost_lbp),
        None => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
    };
    let (new_on_hand, new_avg_usd, new_avg_lbp) =
        moving_average_update(on_hand, avg_usd, avg_lbp, moves, unit_cost_usd, unit_cost_lbp);
    batch_repo::upsert_item_warehouse_cost(tx, item_id, warehouse_id, new_on_hand, new_avg_usd, new_avg_lbp)
        .await?;

    Ok((new_on_hand, new_avg_usd, new_avg_lbp))
}

/// Applies a direct avg-cost delta (from a supplier credit) and records it
/// in the adjustment ledger for exact reversal, per §4.9. The delta is
/// floored at zero — avg cost never goes negative even if the delta would
/// overdraw it.
pub async fn apply_cost_adjustment(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    item_id: Uuid,
    warehouse_id: Uuid,
    delta_usd: Decimal,
    delta_lbp: Decimal,
    source_type: &str,
    source_id: &str,
) -> CoreResult<()> {
    let existing = batch_repo::item_warehouse_cost(tx, item_id, warehouse_id).await?;
    let (on_hand, avg_usd, avg_lbp) = match &existing {
        Some(c) => (c.on_hand_qty, c.avg_cost_usd, c.avg_cost_lbp),
        None => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
    };

    let new_avg_usd = (avg_usd - delta_usd).max(Decimal::ZERO);
    let new_avg_lbp = (avg_lbp - delta_lbp).max(Decimal::ZERO);
    batch_repo::upsert_item_warehouse_cost(tx, item_id, warehouse_id, on_hand, new_avg_usd, new_avg_lbp).await?;

    batch_repo::insert_cost_adjustment(
        tx,
        &InventoryCostAdjustment {
            id: Uuid::new_v4(),
            company_id: ctx.company_id,
            item_id,
            warehouse_id,
            source_type: source_type.to_string(),
            source_id: source_id.to_string(),
            delta_avg_cost_usd: delta_usd,
            delta_avg_cost_lbp: delta_lbp,
        },
    )
    .await?;
    Ok(())
}

/// Validates a cycle-count delta before the caller emits the corresponding
/// in/out move: GL posting (handled by the caller) only happens when the
/// delta is non-zero.
pub fn cycle_count_delta(counted_qty: Decimal, system_qty: Decimal) -> Option<MoveQuantities> {
    let diff = counted_qty - system_qty;
    if diff.is_zero() {
        None
    } else if diff > Decimal::ZERO {
        Some(MoveQuantities::inbound(diff))
    } else {
        Some(MoveQuantities::outbound(-diff))
    }
}

/// Confirms a warehouse location belongs to the given warehouse and is
/// active, failing with `Validation` otherwise.
pub async fn assert_active_location(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    warehouse_id: Uuid,
    location_id: Uuid,
) -> CoreResult<()> {
    let location = item_repo::find_location(tx, warehouse_id, location_id)
        .await?
        .ok_or_else(|| CoreError::Validation("location does not belong to warehouse".to_string()))?;
    if !location.is_active {
        return Err(CoreError::Validation("location is not active".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn move_quantities_rejects_both_zero() {
        let moves = MoveQuantities {
            qty_in: Decimal::ZERO,
            qty_out: Decimal::ZERO,
        };
        assert!(moves.validate().is_err());
    }

    #[test]
    fn move_quantities_rejects_both_positive() {
        let moves = MoveQuantities {
            qty_in: dec!(1),
            qty_out: dec!(1),
        };
        assert!(moves.validate().is_err());
    }

    #[test]
    fn moving_average_blends_inbound_cost() {
        // 10 on hand @ 2.00, receive 10 @ 4.00 -> avg 3.00
        let (on_hand, avg_usd, _) = moving_average_update(
            dec!(10),
            dec!(2.00),
            dec!(180_000),
            MoveQuantities::inbound(dec!(10)),
            dec!(4.00),
            dec!(360_000),
        );
        assert_eq!(on_hand, dec!(20));
        assert_eq!(avg_usd, dec!(3.0000));
    }

    #[test]
    fn outbound_move_leaves_average_cost_unchanged() {
        let (on_hand, avg_usd, avg_lbp) = moving_average_update(
            dec!(10),
            dec!(2.00),
            dec!(180_000),
            MoveQuantities::outbound(dec!(4)),
            Decimal::ZERO,
            Decimal::ZERO,
        );
        assert_eq!(on_hand, dec!(6));
        assert_eq!(avg_usd, dec!(2.00));
        assert_eq!(avg_lbp, dec!(180_000));
    }

    #[test]
    fn first_receipt_into_empty_warehouse_sets_average_directly() {
        let (on_hand, avg_usd, avg_lbp) = moving_average_update(
            Decimal::ZERO,
            Decimal::ZERO,
            Decimal::ZERO,
            MoveQuantities::inbound(dec!(5)),
            dec!(10.00),
            dec!(895_000),
        );
        assert_eq!(on_hand, dec!(5));
        assert_eq!(avg_usd, dec!(10.0000));
        assert_eq!(avg_lbp, dec!(895_000.00));
    }

    #[test]
    fn cycle_count_zero_delta_emits_no_move() {
        assert!(cycle_count_delta(dec!(10), dec!(10)).is_none());
    }

    #[test]
    fn cycle_count_positive_delta_is_inbound() {
        let delta = cycle_count_delta(dec!(12), dec!(10)).unwrap();
        assert_eq!(delta.qty_in, dec!(2));
        assert_eq!(delta.qty_out, Decimal::ZERO);
    }

    #[test]
    fn cycle_count_negative_delta_is_outbound() {
        let delta = cycle_count_delta(dec!(7), dec!(10)).unwrap();
        assert_eq!(delta.qty_out, dec!(3));
    }

    #[test]
    fn cost_adjustment_floors_average_at_zero() {
        let floored = (dec!(1.00) - dec!(5.00)).max(Decimal::ZERO);
        assert_eq!(floored, Decimal::ZERO);
    }
}
