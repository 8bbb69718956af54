//! GL Posting Engine (C7).
//!
//! Every other posting path (purchasing, inventory, supplier credit)
//! builds a `Vec<GlEntryDraft>` and calls [`post_journal`] to emit it —
//! this is the one place auto-balance, numbering, and reversal live.
//! Grounded in `journal_utils.py`'s `auto_balance_and_insert`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::gl::{GlEntry, GlEntryDraft, TaxLine};
use crate::error::{CoreError, CoreResult};
use crate::money::sign;
use crate::repos::gl_repo;
use crate::services::account_defaults;

/// §4.7: tolerances within which a residual diff is absorbed by a single
/// rounding line rather than rejected outright.
const USD_TOLERANCE: Decimal = dec!(0.05);
const LBP_TOLERANCE: Decimal = dec!(5000);

#[derive(Debug, Clone, Copy)]
pub struct JournalTotals {
    pub debit_usd: Decimal,
    pub credit_usd: Decimal,
    pub debit_lbp: Decimal,
    pub credit_lbp: Decimal,
}

impl JournalTotals {
    pub fn of(entries: &[GlEntryDraft]) -> Self {
        let mut t = JournalTotals {
            debit_usd: Decimal::ZERO,
            credit_usd: Decimal::ZERO,
            debit_lbp: Decimal::ZERO,
            credit_lbp: Decimal::ZERO,
        };
        for e in entries {
            t.debit_usd += e.debit_usd;
            t.credit_usd += e.credit_usd;
            t.debit_lbp += e.debit_lbp;
            t.credit_lbp += e.credit_lbp;
        }
        t
    }

    pub fn diff_usd(&self) -> Decimal {
        self.debit_usd - self.credit_usd
    }

    pub fn diff_lbp(&self) -> Decimal {
        self.debit_lbp - self.credit_lbp
    }
}

/// Appends a rounding line (if the residual diff is within tolerance) or
/// fails the journal. Pure function over the draft entries plus the
/// account to post the rounding line against — no I/O, fully unit-tested.
pub fn auto_balance(
    mut entries: Vec<GlEntryDraft>,
    rounding_account_id: Uuid,
) -> CoreResult<Vec<GlEntryDraft>> {
    let totals = JournalTotals::of(&entries);
    let diff_usd = totals.diff_usd();
    let diff_lbp = totals.diff_lbp();

    if diff_usd.is_zero() && diff_lbp.is_zero() {
        return Ok(entries);
    }

    if sign(diff_usd) != 0 && sign(diff_lbp) != 0 && sign(diff_usd) != sign(diff_lbp) {
        return Err(CoreError::SignMismatch);
    }

    if diff_usd.abs() > USD_TOLERANCE || diff_lbp.abs() > LBP_TOLERANCE {
        return Err(CoreError::Imbalanced {
            usd_diff: diff_usd.to_string(),
            lbp_diff: diff_lbp.to_string(),
        });
    }

    // diff > 0 means debits exceed credits; the rounding line must credit
    // the difference (and vice versa).
    let mut rounding = GlEntryDraft {
        account_id: rounding_account_id,
        debit_usd: Decimal::ZERO,
        credit_usd: Decimal::ZERO,
        debit_lbp: Decimal::ZERO,
        credit_lbp: Decimal::ZERO,
        memo: Some("auto-balance rounding".to_string()),
        warehouse_id: None,
        cost_center: None,
        project: None,
    };
    if diff_usd > Decimal::ZERO {
        rounding.credit_usd = diff_usd;
    } else if diff_usd < Decimal::ZERO {
        rounding.debit_usd = -diff_usd;
    }
    if diff_lbp > Decimal::ZERO {
        rounding.credit_lbp = diff_lbp;
    } else if diff_lbp < Decimal::ZERO {
        rounding.debit_lbp = -diff_lbp;
    }

    entries.push(rounding);
    Ok(entries)
}

/// Parameters for emitting a new journal. `journal_no` is allocated by the
/// caller (via `numbering::next_document_no`) before calling this,
/// since callers often need the number for the emitted event too.
#[allow(clippy::too_many_arguments)]
pub struct PostJournalRequest<'a> {
    pub company_id: Uuid,
    pub journal_no: &'a str,
    pub source_type: &'a str,
    pub source_id: &'a str,
    pub journal_date: NaiveDate,
    pub rate_type: &'a str,
    pub exchange_rate: Decimal,
    pub memo: Option<&'a str>,
    pub entries: Vec<GlEntryDraft>,
}

/// Emits a balanced journal. Auto-balances first; the rounding account is
/// resolved fresh on every call rather than cached, since account defaults
/// can be healed between calls.
pub async fn post_journal(
    ctx: &crate::context::Ctx,
    tx: &mut Transaction<'_, Postgres>,
    req: PostJournalRequest<'_>,
) -> CoreResult<Uuid> {
    let rounding_account_id = account_defaults::account_for_role(ctx, "ROUNDING").await?;
    let entries = auto_balance(req.entries, rounding_account_id)?;

    let journal_id = gl_repo::insert_journal(
        tx,
        req.company_id,
        req.journal_no,
        req.source_type,
        req.source_id,
        req.journal_date,
        req.rate_type,
        req.exchange_rate,
        req.memo,
    )
    .await?;
    gl_repo::insert_entries(tx, journal_id, &entries).await?;
    Ok(journal_id)
}

/// §4.7 reversal: idempotent by `(source_type, source_id)` of the cancel
/// journal. Swaps debit/credit of every original entry and mirrors tax
/// lines negated.
pub async fn reverse_journal(
    ctx: &crate::context::Ctx,
    tx: &mut Transaction<'_, Postgres>,
    original_source_type: &str,
    original_source_id: &str,
    journal_no: &str,
    reversal_date: NaiveDate,
) -> CoreResult<Uuid> {
    let cancel_source_type = format!("{original_source_type}_cancel");

    if let Some(existing) = gl_repo::find_journal_by_source(
        tx,
        ctx.company_id,
        &cancel_source_type,
        original_source_id,
    )
    .await?
    {
        return Ok(existing.id);
    }

    let original = gl_repo::find_journal_by_source(
        tx,
        ctx.company_id,
        original_source_type,
        original_source_id,
    )
    .await?
    .ok_or_else(|| {
        CoreError::NotFound(format!(
            "no journal found for {original_source_type}/{original_source_id} to reverse"
        ))
    })?;

    let original_entries = gl_repo::entries_for_journal(tx, original.id).await?;
    let swapped: Vec<GlEntryDraft> = original_entries.iter().map(swap_entry).collect();

    let journal_id = gl_repo::insert_journal(
        tx,
        ctx.company_id,
        journal_no,
        &cancel_source_type,
        original_source_id,
        reversal_date,
        &original.rate_type,
        original.exchange_rate,
        Some("reversal"),
    )
    .await?;
    gl_repo::insert_entries(tx, journal_id, &swapped).await?;

    let tax_lines =
        gl_repo::tax_lines_for_source(tx, ctx.company_id, original_source_type, original_source_id)
            .await?;
    for line in &tax_lines {
        gl_repo::insert_tax_line(tx, &line.negated()).await?;
    }

    Ok(journal_id)
}

fn swap_entry(e: &GlEntry) -> GlEntryDraft {
    GlEntryDraft {
        account_id: e.account_id,
        debit_usd: e.credit_usd,
        credit_usd: e.debit_usd,
        debit_lbp: e.credit_lbp,
        credit_lbp: e.debit_lbp,
        memo: e.memo.clone(),
        warehouse_id: None,
        cost_center: None,
        project: None,
    }
}

/// Validates a manual-journal draft's lines before posting: at least one
/// line, no negative amounts, and a non-zero sum (all-zero lines are
/// meaningless, not just unbalanced).
pub fn validate_manual_journal_lines(entries: &[GlEntryDraft]) -> CoreResult<()> {
    if entries.is_empty() {
        return Err(CoreError::Validation(
            "manual journal requires at least one line".to_string(),
        ));
    }
    for e in entries {
        if e.debit_usd < Decimal::ZERO
            || e.credit_usd < Decimal::ZERO
            || e.debit_lbp < Decimal::ZERO
            || e.credit_lbp < Decimal::ZERO
        {
            return Err(CoreError::Validation(
                "manual journal lines must be non-negative".to_string(),
            ));
        }
    }
    let totals = JournalTotals::of(entries);
    if totals.debit_usd.is_zero()
        && totals.credit_usd.is_zero()
        && totals.debit_lbp.is_zero()
        && totals.credit_lbp.is_zero()
    {
        return Err(CoreError::Validation(
            "manual journal lines sum to zero".to_string(),
        ));
    }
    Ok(())
}

/// Templates must already balance in both currencies at save time — no
/// rounding line is applied here, unlike posting.
pub fn validate_template_balances(entries: &[GlEntryDraft]) -> CoreResult<()> {
    let totals = JournalTotals::of(entries);
    if !totals.diff_usd().is_zero() || !totals.diff_lbp().is_zero() {
        return Err(CoreError::Validation(
            "journal template lines must balance exactly".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(debit_usd: Decimal, credit_usd: Decimal, debit_lbp: Decimal, credit_lbp: Decimal) -> GlEntryDraft {
        GlEntryDraft {
            account_id: Uuid::new_v4(),
            debit_usd,
            credit_usd,
            debit_lbp,
            credit_lbp,
            memo: None,
            warehouse_id: None,
            cost_center: None,
            project: None,
        }
    }

    #[test]
    fn balanced_journal_needs_no_rounding_line() {
        let entries = vec![
            draft(dec!(100), Decimal::ZERO, dec!(8_950_000), Decimal::ZERO),
            draft(Decimal::ZERO, dec!(100), Decimal::ZERO, dec!(8_950_000)),
        ];
        let result = auto_balance(entries.clone(), Uuid::new_v4()).unwrap();
        assert_eq!(result.len(), entries.len());
    }

    #[test]
    fn small_residual_gets_a_rounding_line() {
        let entries = vec![
            draft(dec!(100.0003), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            draft(Decimal::ZERO, dec!(100.0000), Decimal::ZERO, Decimal::ZERO),
        ];
        let rounding_account = Uuid::new_v4();
        let result = auto_balance(entries, rounding_account).unwrap();
        assert_eq!(result.len(), 3);
        let rounding_line = result.last().unwrap();
        assert_eq!(rounding_line.account_id, rounding_account);
        assert_eq!(rounding_line.credit_usd, dec!(0.0003));
    }

    #[test]
    fn residual_beyond_tolerance_is_imbalanced() {
        let entries = vec![
            draft(dec!(100.10), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            draft(Decimal::ZERO, dec!(100.00), Decimal::ZERO, Decimal::ZERO),
        ];
        let err = auto_balance(entries, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, CoreError::Imbalanced { .. }));
    }

    #[test]
    fn opposite_sign_diffs_are_sign_mismatch() {
        let entries = vec![
            draft(dec!(100.01), Decimal::ZERO, Decimal::ZERO, dec!(100)),
            draft(Decimal::ZERO, dec!(100.00), dec!(200), Decimal::ZERO),
        ];
        let err = auto_balance(entries, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, CoreError::SignMismatch));
    }

    #[test]
    fn manual_journal_rejects_empty_lines() {
        let err = validate_manual_journal_lines(&[]).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn manual_journal_rejects_negative_amounts() {
        let entries = vec![draft(dec!(-5), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)];
        let err = validate_manual_journal_lines(&entries).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn manual_journal_rejects_all_zero_sum() {
        let entries = vec![draft(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)];
        let err = validate_manual_journal_lines(&entries).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn template_must_balance_exactly_no_tolerance() {
        let entries = vec![
            draft(dec!(100.001), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            draft(Decimal::ZERO, dec!(100.000), Decimal::ZERO, Decimal::ZERO),
        ];
        let err = validate_template_balances(&entries).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn swap_entry_exchanges_debit_and_credit() {
        let entry = GlEntry {
            id: Uuid::new_v4(),
            journal_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            debit_usd: dec!(50),
            credit_usd: Decimal::ZERO,
            debit_lbp: Decimal::ZERO,
            credit_lbp: dec!(4_475_000),
            memo: None,
        };
        let swapped = swap_entry(&entry);
        assert_eq!(swapped.credit_usd, dec!(50));
        assert_eq!(swapped.debit_lbp, dec!(4_475_000));
    }
}
