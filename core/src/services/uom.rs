//! UOM Resolver (C4).
//!
//! Pure conversion logic between an item's base unit and whatever unit a
//! document line was entered in. Grounded in `uom.py`'s
//! `resolve_line_quantity`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{CoreError, CoreResult};

const FACTOR_SCALE: u32 = 6;
const CONSISTENCY_EPSILON: Decimal = dec!(0.000001);
const LEGACY_4DP_TOLERANCE: Decimal = dec!(0.00005);

/// The canonical, post-resolution shape of one line's quantity fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedQuantity {
    pub qty_factor: Decimal,
    pub qty_entered: Decimal,
    pub qty_base: Decimal,
}

/// `conversion_factor` is the active `ItemUomConversion.to_base_factor`
/// looked up by the caller for a non-base `uom`; `None` for the base unit
/// itself (factor 1).
pub fn resolve_line_quantity(
    qty_base: Decimal,
    qty_entered: Option<Decimal>,
    is_base_uom: bool,
    conversion_factor: Option<Decimal>,
    input_factor: Option<Decimal>,
) -> CoreResult<ResolvedQuantity> {
    if qty_base <= Decimal::ZERO {
        return Err(CoreError::Validation("qty_base must be positive".to_string()));
    }

    if !is_base_uom && conversion_factor.is_none() {
        return Err(CoreError::Validation(
            "non-base unit of measure requires an active conversion".to_string(),
        ));
    }

    let canonical_factor = conversion_factor.unwrap_or(Decimal::ONE).round_dp(FACTOR_SCALE);

    let accepted_factor = match input_factor {
        Some(input) if accepts_legacy_factor(input, canonical_factor) => input,
        _ => canonical_factor,
    };

    if let Some(entered) = qty_entered {
        if entered > Decimal::ZERO {
            let implied = entered * accepted_factor;
            if (qty_base - implied).abs() > CONSISTENCY_EPSILON {
                return Err(CoreError::Validation(format!(
                    "qty_base {qty_base} inconsistent with entered {entered} × factor {accepted_factor}"
                )));
            }
        }
    }

    let qty_entered_out = qty_entered.unwrap_or_else(|| {
        if accepted_factor.is_zero() {
            Decimal::ZERO
        } else {
            qty_base / accepted_factor
        }
    });

    Ok(ResolvedQuantity {
        qty_factor: canonical_factor,
        qty_entered: qty_entered_out.round_dp(FACTOR_SCALE),
        qty_base,
    })
}

/// §4.4 legacy-factor compatibility: accept a 4dp input factor whose 4dp
/// bucket equals the canonical value, or whose absolute deviation from the
/// canonical 6dp value is within half a 4dp step.
fn accepts_legacy_factor(input: Decimal, canonical: Decimal) -> bool {
    let input_4dp = input.round_dp(4);
    let canonical_4dp = canonical.round_dp(4);
    if input_4dp == canonical_4dp {
        return true;
    }
    (input - canonical).abs() <= LEGACY_4DP_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_uom_defaults_factor_to_one() {
        let result = resolve_line_quantity(dec!(10), None, true, None, None).unwrap();
        assert_eq!(result.qty_factor, Decimal::ONE);
        assert_eq!(result.qty_entered, dec!(10));
    }

    #[test]
    fn non_base_uom_without_conversion_is_rejected() {
        let err = resolve_line_quantity(dec!(10), None, false, None, None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn zero_or_negative_base_qty_is_rejected() {
        let err = resolve_line_quantity(Decimal::ZERO, None, true, None, None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn inconsistent_entered_quantity_is_rejected() {
        let err =
            resolve_line_quantity(dec!(10), Some(dec!(2)), false, Some(dec!(4)), None).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn consistent_entered_quantity_is_accepted() {
        let result =
            resolve_line_quantity(dec!(12), Some(dec!(1)), false, Some(dec!(12)), None).unwrap();
        assert_eq!(result.qty_entered, dec!(1));
        assert_eq!(result.qty_factor, dec!(12));
    }

    #[test]
    fn legacy_4dp_factor_within_bucket_is_accepted_verbatim() {
        // Canonical is 12.000000; input 12.0000 rounds to the same 4dp
        // bucket, so it's accepted as-is rather than replaced.
        let accepted = accepts_legacy_factor(dec!(12.0000), dec!(12.000000));
        assert!(accepted);
    }

    #[test]
    fn legacy_factor_within_half_step_deviation_is_accepted() {
        assert!(accepts_legacy_factor(dec!(12.00004), dec!(12.0)));
        assert!(!accepts_legacy_factor(dec!(12.0001), dec!(12.0)));
    }

    #[test]
    fn qty_entered_is_derived_when_absent() {
        let result = resolve_line_quantity(dec!(24), None, false, Some(dec!(12)), None).unwrap();
        assert_eq!(result.qty_entered, dec!(2));
    }
}
