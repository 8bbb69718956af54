//! Shared tax models used by the purchasing and import-pipeline components.
//!
//! Tax here is deliberately thin: a `TaxCode` carries the rate a supplier
//! invoice's header references, and every line-level computation in core
//! goes through [`tax_lbp_for_base`] / [`tax_usd_for_base`] so that rounding
//! and the LBP-is-the-anchor convention (see `§4.8` of the posting engine)
//! live in exactly one place.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaxError {
    #[error("tax code {0} not found or inactive for this company")]
    UnknownCode(String),
}

pub type TaxResult<T> = Result<T, TaxError>;

/// A company-scoped tax code, e.g. Lebanon's standard 11% VAT.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxCode {
    pub id: Uuid,
    pub company_id: Uuid,
    pub code: String,
    pub rate: Decimal,
    pub is_active: bool,
}

impl TaxCode {
    pub fn zero(company_id: Uuid) -> Self {
        Self {
            id: Uuid::nil(),
            company_id,
            code: "NONE".to_string(),
            rate: Decimal::ZERO,
            is_active: true,
        }
    }
}

/// Resolves tax codes for a company. The concrete implementation lives in
/// `core`'s repo layer (backed by the `tax_codes` table); this trait exists
/// so the pure computation below never needs a database handle.
pub trait TaxProvider {
    fn rate_for(&self, code: &str) -> TaxResult<Decimal>;
}

/// `tax_lbp = base_lbp * rate`, quantized by the caller (money quantization
/// is `erp_core`'s job — this crate only knows the multiplication).
pub fn tax_lbp_for_base(base_lbp: Decimal, rate: Decimal) -> Decimal {
    base_lbp * rate
}

/// Derives the USD-side tax from the LBP tax and the posting-document
/// exchange rate, per the posting engine's rule that LBP is the anchor for
/// tax computed off a header rate.
pub fn tax_usd_for_lbp(tax_lbp: Decimal, usd_to_lbp: Decimal) -> Decimal {
    if usd_to_lbp.is_zero() {
        Decimal::ZERO
    } else {
        tax_lbp / usd_to_lbp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tax_lbp_multiplies_base_by_rate() {
        let t = tax_lbp_for_base(dec!(1_000_000), dec!(0.11));
        assert_eq!(t, dec!(110000.00));
    }

    #[test]
    fn tax_usd_derives_from_lbp_and_rate() {
        let usd = tax_usd_for_lbp(dec!(110_000), dec!(89_500));
        assert!(usd > Decimal::ZERO);
    }

    #[test]
    fn tax_usd_is_zero_when_rate_unknown() {
        assert_eq!(tax_usd_for_lbp(dec!(110_000), Decimal::ZERO), Decimal::ZERO);
    }
}
