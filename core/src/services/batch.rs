//! Batch & Cost-Layer Engine (C5).
//!
//! Batch identity resolution and FEFO allocation are pure functions over
//! caller-supplied candidates; the repo layer supplies those candidates
//! from `batches`/`stock_moves`. Grounded in the original's FEFO allocator
//! (`inventory/fefo.py`).

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::batch::{BatchStatus, FefoAllocation, FefoCandidate};
use crate::error::{CoreError, CoreResult};

/// Orders candidates by (expiry_date ascending, NULLs last, created_at
/// ascending), drops quarantined/expired and any whose `expiry_date` is
/// before the minimum shelf-life floor, then allocates greedily.
///
/// `allow_negative_stock` folds any unsatisfied remainder into the last
/// candidate considered (even if that overdraws it) rather than failing —
/// callers for untracked items should instead use
/// [`allocate_unbatched_remainder`].
pub fn allocate_fefo(
    mut candidates: Vec<FefoCandidate>,
    qty_needed: Decimal,
    min_expiry_date: Option<NaiveDate>,
    allow_negative_stock: bool,
) -> CoreResult<Vec<FefoAllocation>> {
    if qty_needed <= Decimal::ZERO {
        return Err(CoreError::Validation(
            "FEFO allocation requires a positive quantity".to_string(),
        ));
    }

    candidates.retain(|c| {
        if matches!(c.status, BatchStatus::Quarantine | BatchStatus::Expired) {
            return false;
        }
        match (min_expiry_date, c.expiry_date) {
            (Some(floor), Some(expiry)) => expiry >= floor,
            (Some(_), None) => false,
            (None, _) => true,
        }
    });

    candidates.sort_by(|a, b| match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y).then(a.created_at.cmp(&b.created_at)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.created_at.cmp(&b.created_at),
    });

    let mut remaining = qty_needed;
    let mut allocations = Vec::new();

    for candidate in &candidates {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = remaining.min(candidate.on_hand_qty.max(Decimal::ZERO));
        if take > Decimal::ZERO {
            allocations.push(FefoAllocation {
                batch_id: candidate.batch_id,
                qty: take,
            });
            remaining -= take;
        }
    }

    if remaining > Decimal::ZERO {
        if allow_negative_stock {
            if let Some(last) = allocations.last_mut() {
                last.qty += remaining;
            } else if let Some(candidate) = candidates.last() {
                allocations.push(FefoAllocation {
                    batch_id: candidate.batch_id,
                    qty: remaining,
                });
            } else {
                return Err(CoreError::InsufficientStock {
                    item_id: String::new(),
                    requested: qty_needed.to_string(),
                    available: Decimal::ZERO.to_string(),
                });
            }
        } else {
            let available: Decimal = candidates.iter().map(|c| c.on_hand_qty.max(Decimal::ZERO)).sum();
            return Err(CoreError::InsufficientStock {
                item_id: String::new(),
                requested: qty_needed.to_string(),
                available: available.to_string(),
            });
        }
    }

    Ok(allocations)
}

/// Derives an expiry date from a receipt date and the item's
/// `default_shelf_life_days` when the receipt omitted one.
pub fn derive_expiry_date(received_date: NaiveDate, default_shelf_life_days: Option<i32>) -> Option<NaiveDate> {
    default_shelf_life_days.and_then(|days| received_date.checked_add_signed(chrono::Duration::days(days as i64)))
}

/// Floor date for FEFO filtering given a minimum required shelf life.
pub fn min_expiry_floor(min_shelf_life_days_for_sale: Option<i32>) -> Option<NaiveDate> {
    min_shelf_life_days_for_sale
        .map(|days| Utc::now().date_naive() + chrono::Duration::days(days as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn candidate(days_from_epoch: i64, expiry: Option<NaiveDate>, status: BatchStatus, qty: Decimal) -> FefoCandidate {
        FefoCandidate {
            batch_id: Uuid::new_v4(),
            expiry_date: expiry,
            created_at: Utc.timestamp_opt(days_from_epoch * 86400, 0).unwrap(),
            status,
            on_hand_qty: qty,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn allocates_earliest_expiry_first() {
        let candidates = vec![
            candidate(1, Some(date(2026, 12, 1)), BatchStatus::Available, dec!(5)),
            candidate(2, Some(date(2026, 6, 1)), BatchStatus::Available, dec!(5)),
        ];
        let result = allocate_fefo(candidates, dec!(3), None, false).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].qty, dec!(3));
    }

    #[test]
    fn nulls_sort_last() {
        let earlier = candidate(1, Some(date(2026, 6, 1)), BatchStatus::Available, dec!(2));
        let no_expiry = candidate(2, None, BatchStatus::Available, dec!(10));
        let result = allocate_fefo(vec![no_expiry, earlier], dec!(4), None, false).unwrap();
        assert_eq!(result.len(), 2);
        // First allocation drains the dated batch before the undated one.
        assert_eq!(result[0].qty, dec!(2));
        assert_eq!(result[1].qty, dec!(2));
    }

    #[test]
    fn quarantined_and_expired_batches_are_skipped() {
        let candidates = vec![
            candidate(1, Some(date(2026, 1, 1)), BatchStatus::Quarantine, dec!(100)),
            candidate(2, Some(date(2026, 2, 1)), BatchStatus::Expired, dec!(100)),
            candidate(3, Some(date(2026, 3, 1)), BatchStatus::Available, dec!(5)),
        ];
        let result = allocate_fefo(candidates, dec!(5), None, false).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn min_shelf_life_floor_excludes_near_expiry_batches() {
        let candidates = vec![
            candidate(1, Some(date(2026, 1, 1)), BatchStatus::Available, dec!(5)),
            candidate(2, Some(date(2027, 1, 1)), BatchStatus::Available, dec!(5)),
        ];
        let result = allocate_fefo(candidates, dec!(3), Some(date(2026, 6, 1)), false).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].qty, dec!(3));
    }

    #[test]
    fn insufficient_stock_without_negative_allowance_fails() {
        let candidates = vec![candidate(1, Some(date(2026, 1, 1)), BatchStatus::Available, dec!(2))];
        let err = allocate_fefo(candidates, dec!(5), None, false).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { .. }));
    }

    #[test]
    fn allow_negative_stock_folds_remainder_into_last_batch() {
        let candidates = vec![candidate(1, Some(date(2026, 1, 1)), BatchStatus::Available, dec!(2))];
        let result = allocate_fefo(candidates, dec!(5), None, true).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].qty, dec!(5));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = allocate_fefo(vec![], Decimal::ZERO, None, false).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn derives_expiry_from_shelf_life_days() {
        let received = date(2026, 1, 1);
        let derived = derive_expiry_date(received, Some(30)).unwrap();
        assert_eq!(derived, date(2026, 1, 31));
    }

    #[test]
    fn no_shelf_life_days_means_no_derived_expiry() {
        assert!(derive_expiry_date(date(2026, 1, 1), None).is_none());
    }
}
