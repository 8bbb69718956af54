//! Money & Quantization (C1).
//!
//! Every monetary amount in the system is a `(usd, lbp)` pair. All
//! arithmetic is `rust_decimal::Decimal` — never a binary float — per
//! spec.md §4.1. Grounded in `journal_utils.py::q_usd`/`q_lbp`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const USD_SCALE: u32 = 4;
const LBP_SCALE: u32 = 2;

/// Half-up rounding to 4 decimal places, matching `ROUND_HALF_UP` in the
/// original Python (`Decimal.quantize` default banker's rounding is *not*
/// what the source uses).
pub fn q_usd(x: Decimal) -> Decimal {
    round_half_up(x, USD_SCALE)
}

/// Half-up rounding to 2 decimal places.
pub fn q_lbp(x: Decimal) -> Decimal {
    round_half_up(x, LBP_SCALE)
}

fn round_half_up(x: Decimal, scale: u32) -> Decimal {
    x.round_dp_with_strategy(scale, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

pub fn sign(x: Decimal) -> i32 {
    match x.cmp(&Decimal::ZERO) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

/// A dual-currency amount, always stored quantized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DualAmount {
    pub usd: Decimal,
    pub lbp: Decimal,
}

impl DualAmount {
    pub fn zero() -> Self {
        Self {
            usd: Decimal::ZERO,
            lbp: Decimal::ZERO,
        }
    }

    pub fn new(usd: Decimal, lbp: Decimal) -> Self {
        Self {
            usd: q_usd(usd),
            lbp: q_lbp(lbp),
        }
    }

    /// Derivation rule (spec.md §4.1): if exactly one side is zero and a
    /// rate is known, derive the other side. Never recomputes when both
    /// sides are already provided — a caller who explicitly set both
    /// amounts is trusted over the rate.
    pub fn normalize(usd: Decimal, lbp: Decimal, usd_to_lbp: Decimal) -> Self {
        if usd.is_zero() && !lbp.is_zero() && usd_to_lbp > Decimal::ZERO {
            return Self::new(lbp / usd_to_lbp, lbp);
        }
        if lbp.is_zero() && !usd.is_zero() && usd_to_lbp > Decimal::ZERO {
            return Self::new(usd, usd * usd_to_lbp);
        }
        Self::new(usd, lbp)
    }

    pub fn add(self, other: DualAmount) -> Self {
        Self::new(self.usd + other.usd, self.lbp + other.lbp)
    }

    pub fn sub(self, other: DualAmount) -> Self {
        Self::new(self.usd - other.usd, self.lbp - other.lbp)
    }

    pub fn neg(self) -> Self {
        Self::new(-self.usd, -self.lbp)
    }

    pub fn is_zero(&self) -> bool {
        self.usd.is_zero() && self.lbp.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn q_usd_rounds_half_up_to_four_places() {
        assert_eq!(q_usd(dec!(1.00005)), dec!(1.0001));
        assert_eq!(q_usd(dec!(1.000049)), dec!(1.0000));
    }

    #[test]
    fn q_lbp_rounds_half_up_to_two_places() {
        assert_eq!(q_lbp(dec!(1000.005)), dec!(1000.01));
        assert_eq!(q_lbp(dec!(1000.004)), dec!(1000.00));
    }

    #[test]
    fn sign_classifies_correctly() {
        assert_eq!(sign(dec!(5)), 1);
        assert_eq!(sign(dec!(-5)), -1);
        assert_eq!(sign(dec!(0)), 0);
    }

    #[test]
    fn normalize_derives_lbp_from_usd_and_rate() {
        let got = DualAmount::normalize(dec!(10), dec!(0), dec!(89_500));
        assert_eq!(got.usd, dec!(10.0000));
        assert_eq!(got.lbp, dec!(895000.00));
    }

    #[test]
    fn normalize_derives_usd_from_lbp_and_rate() {
        let got = DualAmount::normalize(dec!(0), dec!(895_000), dec!(89_500));
        assert_eq!(got.usd, dec!(10.0000));
    }

    #[test]
    fn normalize_never_recomputes_when_both_sides_given() {
        // Even though the rate implies a different LBP value, both sides
        // were supplied explicitly, so neither is touched beyond rounding.
        let got = DualAmount::normalize(dec!(10), dec!(1), dec!(89_500));
        assert_eq!(got.usd, dec!(10.0000));
        assert_eq!(got.lbp, dec!(1.00));
    }

    #[test]
    fn normalize_leaves_both_zero_when_rate_unknown() {
        let got = DualAmount::normalize(dec!(0), dec!(0), dec!(0));
        assert!(got.is_zero());
    }

    #[test]
    fn dual_amount_add_and_neg_round_trip_to_zero() {
        let a = DualAmount::new(dec!(12.3456), dec!(1_000_000.12));
        let sum = a.add(a.neg());
        assert!(sum.is_zero());
    }
}
