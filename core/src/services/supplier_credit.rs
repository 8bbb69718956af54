//! Supplier Credit Engine (C9): expense-kind and receipt-linked credit
//! notes, invoice application, and cancellation.
//!
//! Grounded in `services::purchasing`'s post/cancel shape and
//! `journal_utils.py`'s GL-then-audit ordering. The receipt-linked
//! allocation split is new to this engine (spec.md §4.9) but follows the
//! weighted-ratio style already used by [`crate::services::batch::allocate_fefo`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::context::Ctx;
use crate::domain::gl::GlEntryDraft;
use crate::domain::supplier_credit::{ReceiptLineForCredit, SupplierCreditAllocation};
use crate::error::{CoreError, CoreResult};
use crate::money::{q_lbp, q_usd, DualAmount};
use crate::repos::{account_repo, batch_repo, gl_repo, purchasing_repo, supplier_credit_repo};
use crate::services::gl_posting::PostJournalRequest;
use crate::services::{account_defaults, gl_posting, inventory, period_lock};

/// Creates a draft expense-kind credit note (no goods receipt involved):
/// a flat rebate, discount, or correction from the supplier.
pub async fn create_expense_credit_note(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    company_id: Uuid,
    supplier_id: Uuid,
    total_usd: Decimal,
    total_lbp: Decimal,
) -> CoreResult<Uuid> {
    if total_usd <= Decimal::ZERO && total_lbp <= Decimal::ZERO {
        return Err(CoreError::Validation(
            "credit note total must be positive".to_string(),
        ));
    }
    supplier_credit_repo::create_credit_note(
        tx,
        company_id,
        supplier_id,
        "expense",
        None,
        q_usd(total_usd),
        q_lbp(total_lbp),
    )
    .await
    .map_err(CoreError::from)
}

/// Creates a draft receipt-linked credit note against a posted goods
/// receipt: a return, shortage, or price correction tied to specific
/// receipt lines.
pub async fn create_receipt_credit_note(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    company_id: Uuid,
    supplier_id: Uuid,
    goods_receipt_id: Uuid,
    total_usd: Decimal,
    total_lbp: Decimal,
) -> CoreResult<Uuid> {
    if total_usd <= Decimal::ZERO && total_lbp <= Decimal::ZERO {
        return Err(CoreError::Validation(
            "credit note total must be positive".to_string(),
        ));
    }
    supplier_credit_repo::create_credit_note(
        tx,
        company_id,
        supplier_id,
        "receipt",
        Some(goods_receipt_id),
        q_usd(total_usd),
        q_lbp(total_lbp),
    )
    .await
    .map_err(CoreError::from)
}

/// Splits a receipt-linked credit note's total across the receipt lines
/// supplied by the caller, weighted by each line's monetary value (falling
/// back to quantity when every line's value is zero), then further splits
/// each line's share between inventory (on-hand portion) and COGS (sold
/// portion) by that line's on-hand/received ratio. Any rounding residue
/// from the per-line monetary split is absorbed into the last line; any
/// residue from the inventory/COGS split is absorbed into COGS.
pub fn allocate_receipt_credit(
    lines: &[ReceiptLineForCredit],
    total_usd: Decimal,
    total_lbp: Decimal,
) -> CoreResult<Vec<SupplierCreditAllocation>> {
    if lines.is_empty() {
        return Err(CoreError::Validation(
            "receipt-linked credit requires at least one receipt line".to_string(),
        ));
    }

    let value_weight_total: Decimal = lines.iter().map(|l| l.line_value_usd.max(Decimal::ZERO)).sum();
    let use_qty_weight = value_weight_total <= Decimal::ZERO;
    let qty_weight_total: Decimal = lines.iter().map(|l| l.line_qty.max(Decimal::ZERO)).sum();

    let mut allocations = Vec::with_capacity(lines.len());
    let mut spent_usd = Decimal::ZERO;
    let mut spent_lbp = Decimal::ZERO;

    for (idx, line) in lines.iter().enumerate() {
        let is_last = idx == lines.len() - 1;
        let weight = if use_qty_weight {
            if qty_weight_total.is_zero() {
                Decimal::ONE / Decimal::from(lines.len() as u64)
            } else {
                line.line_qty.max(Decimal::ZERO) / qty_weight_total
            }
        } else {
            line.line_value_usd.max(Decimal::ZERO) / value_weight_total
        };

        let (alloc_usd, alloc_lbp) = if is_last {
            (q_usd(total_usd - spent_usd), q_lbp(total_lbp - spent_lbp))
        } else {
            (q_usd(total_usd * weight), q_lbp(total_lbp * weight))
        };
        spent_usd += alloc_usd;
        spent_lbp += alloc_lbp;

        let on_hand_ratio = if line.line_qty > Decimal::ZERO {
            (line.on_hand_qty.max(Decimal::ZERO) / line.line_qty).min(Decimal::ONE)
        } else {
            Decimal::ZERO
        };

        let inventory_usd = q_usd(alloc_usd * on_hand_ratio);
        let inventory_lbp = q_lbp(alloc_lbp * on_hand_ratio);
        let cogs_usd = alloc_usd - inventory_usd;
        let cogs_lbp = alloc_lbp - inventory_lbp;

        allocations.push(SupplierCreditAllocation {
            id: Uuid::new_v4(),
            credit_note_id: Uuid::nil(),
            goods_receipt_line_id: line.goods_receipt_line_id,
            batch_id: line.batch_id,
            alloc_usd,
            alloc_lbp,
            inventory_usd,
            inventory_lbp,
            cogs_usd,
            cogs_lbp,
        });
    }

    Ok(allocations)
}

/// Posts a draft credit note: computes (for receipt-kind) or accepts (for
/// expense-kind, already fixed at draft time) the allocation, emits the
/// balanced journal, and for receipt-kind lines with an inventory share,
/// walks the avg-cost ledger backward via
/// [`inventory::apply_cost_adjustment`].
#[allow(clippy::too_many_arguments)]
pub async fn post_credit_note(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    credit_note_id: Uuid,
    warehouse_id: Option<Uuid>,
    receipt_lines: &[ReceiptLineForCredit],
    posting_date: NaiveDate,
) -> CoreResult<Uuid> {
    let note = supplier_credit_repo::find_credit_note(tx, ctx.company_id, credit_note_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("supplier credit note not found".to_string()))?;

    if note.status != "draft" {
        return Err(CoreError::Precondition("credit note is not a draft".to_string()));
    }

    period_lock::assert_period_open(ctx, tx, posting_date).await?;

    if let Some(existing) =
        gl_repo::find_journal_by_source(tx, ctx.company_id, "supplier_credit_note", &credit_note_id.to_string())
            .await?
    {
        return Err(CoreError::conflict(
            "credit note already has posted GL artifacts",
            Some(serde_json::json!({ "journal_id": existing.id })),
        ));
    }

    let ap_account = account_defaults::account_for_role(ctx, "AP").await?;
    let journal_no = numbering::next_document_no(tx, ctx.company_id, "supplier_credit_note", "CN-").await?;

    let journal_id = if note.kind == "expense" {
        let credit_account = match account_repo::account_for_role(ctx.pool(), ctx.company_id, "PURCHASE_REBATES").await? {
            Some(account_id) => account_id,
            None => account_defaults::account_for_role(ctx, "PURCHASES_EXPENSE").await?,
        };
        let amount = DualAmount {
            usd: note.total_usd,
            lbp: note.total_lbp,
        };
        let entries = vec![
            GlEntryDraft::debit(ap_account, amount, "Supplier credit note"),
            GlEntryDraft::credit(credit_account, amount, "Supplier credit note"),
        ];
        gl_posting::post_journal(
            ctx,
            tx,
            PostJournalRequest {
                company_id: ctx.company_id,
                journal_no: &journal_no,
                source_type: "supplier_credit_note",
                source_id: &credit_note_id.to_string(),
                journal_date: posting_date,
                rate_type: "actual",
                exchange_rate: Decimal::ONE,
                memo: Some("Supplier credit note"),
                entries,
            },
        )
        .await?
    } else {
        let warehouse_id = warehouse_id
            .ok_or_else(|| CoreError::Validation("receipt-linked credit requires a warehouse".to_string()))?;
        let allocations = allocate_receipt_credit(receipt_lines, note.total_usd, note.total_lbp)?;

        let mut inventory_total = DualAmount::zero();
        let mut cogs_total = DualAmount::zero();
        for alloc in &allocations {
            inventory_total.usd += alloc.inventory_usd;
            inventory_total.lbp += alloc.inventory_lbp;
            cogs_total.usd += alloc.cogs_usd;
            cogs_total.lbp += alloc.cogs_lbp;
        }

        let mut entries = Vec::new();
        entries.push(GlEntryDraft::debit(ap_account, DualAmount { usd: note.total_usd, lbp: note.total_lbp }, "Supplier credit note"));
        if !inventory_total.usd.is_zero() || !inventory_total.lbp.is_zero() {
            let inventory_account = account_defaults::account_for_role(ctx, "INVENTORY").await?;
            entries.push(GlEntryDraft::credit(inventory_account, inventory_total, "Supplier credit note - inventory"));
        }
        if !cogs_total.usd.is_zero() || !cogs_total.lbp.is_zero() {
            let cogs_account = account_defaults::account_for_role(ctx, "COGS").await?;
            entries.push(GlEntryDraft::credit(cogs_account, cogs_total, "Supplier credit note - cogs"));
        }

        let journal_id = gl_posting::post_journal(
            ctx,
            tx,
            PostJournalRequest {
                company_id: ctx.company_id,
                journal_no: &journal_no,
                source_type: "supplier_credit_note",
                source_id: &credit_note_id.to_string(),
                journal_date: posting_date,
                rate_type: "actual",
                exchange_rate: Decimal::ONE,
                memo: Some("Supplier credit note"),
                entries,
            },
        )
        .await?;

        for alloc in &allocations {
            supplier_credit_repo::insert_allocation(
                tx,
                &SupplierCreditAllocation {
                    credit_note_id,
                    ..alloc.clone()
                },
            )
            .await?;

            if let Some(batch_id) = alloc.batch_id {
                if !alloc.inventory_usd.is_zero() || !alloc.inventory_lbp.is_zero() {
                    let item_id = batch_repo::item_id_for_batch(tx, batch_id)
                        .await?
                        .ok_or_else(|| CoreError::NotFound("batch not found".to_string()))?;
                    inventory::apply_cost_adjustment(
                        ctx,
                        tx,
                        item_id,
                        warehouse_id,
                        alloc.inventory_usd,
                        alloc.inventory_lbp,
                        "supplier_credit_note",
                        &credit_note_id.to_string(),
                    )
                    .await?;
                }
            }
        }

        journal_id
    };

    supplier_credit_repo::set_credit_note_posted(tx, credit_note_id, &journal_no).await?;

    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "purchasing.supplier_credit_note.post",
        "supplier_credit_note",
        &credit_note_id.to_string(),
        serde_json::json!({ "journal_id": journal_id }),
    )
    .await?;

    Ok(journal_id)
}

/// Applies a posted credit note (or part of it) against an invoice's
/// remaining open balance. The applied amount may not exceed whichever is
/// smaller: the credit note's remaining balance, or the invoice's
/// remaining open balance — both checked with a small epsilon to absorb
/// quantization drift.
pub async fn apply_credit_to_invoice(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    credit_note_id: Uuid,
    invoice_id: Uuid,
    amount_usd: Decimal,
    amount_lbp: Decimal,
) -> CoreResult<Uuid> {
    const EPSILON_USD: Decimal = rust_decimal_macros::dec!(0.01);
    const EPSILON_LBP: Decimal = rust_decimal_macros::dec!(1000);

    let note = supplier_credit_repo::find_credit_note(tx, ctx.company_id, credit_note_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("supplier credit note not found".to_string()))?;
    if note.status != "posted" {
        return Err(CoreError::Precondition("credit note is not posted".to_string()));
    }

    let invoice = purchasing_repo::find_si(tx, ctx.company_id, invoice_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("supplier invoice not found".to_string()))?;
    if invoice.status != "posted" {
        return Err(CoreError::Precondition("invoice is not posted".to_string()));
    }

    let (credit_applied_usd, credit_applied_lbp) =
        supplier_credit_repo::applied_total_for_credit_note(tx, credit_note_id).await?;
    let credit_remaining_usd = note.total_usd - credit_applied_usd;
    let credit_remaining_lbp = note.total_lbp - credit_applied_lbp;

    if amount_usd > credit_remaining_usd + EPSILON_USD || amount_lbp > credit_remaining_lbp + EPSILON_LBP {
        return Err(CoreError::Validation(
            "application amount exceeds the credit note's remaining balance".to_string(),
        ));
    }

    let (lines_usd, lines_lbp): (Decimal, Decimal) = {
        let lines = purchasing_repo::si_lines(tx, invoice_id).await?;
        (
            lines.iter().map(|l| l.line_total_usd).sum(),
            lines.iter().map(|l| l.line_total_lbp).sum(),
        )
    };
    let (tax_usd, tax_lbp) = purchasing_repo::invoice_tax_total(tx, ctx.company_id, invoice_id).await?;
    let (paid_usd, paid_lbp) = {
        let payments = purchasing_repo::payments_for_invoice(tx, invoice_id).await?;
        (
            payments.iter().map(|p| p.amount_usd).sum(),
            payments.iter().map(|p| p.amount_lbp).sum(),
        )
    };
    let (applied_usd, applied_lbp) = supplier_credit_repo::applied_total_for_invoice(tx, invoice_id).await?;

    let open_usd = lines_usd + tax_usd - paid_usd - applied_usd;
    let open_lbp = lines_lbp + tax_lbp - paid_lbp - applied_lbp;

    if amount_usd > open_usd + EPSILON_USD || amount_lbp > open_lbp + EPSILON_LBP {
        return Err(CoreError::Validation(
            "application amount exceeds the invoice's remaining open balance".to_string(),
        ));
    }

    let application_id =
        supplier_credit_repo::insert_application(tx, credit_note_id, invoice_id, q_usd(amount_usd), q_lbp(amount_lbp))
            .await?;

    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "purchasing.supplier_credit_note.apply",
        "supplier_credit_note",
        &credit_note_id.to_string(),
        serde_json::json!({ "invoice_id": invoice_id, "amount_usd": amount_usd, "amount_lbp": amount_lbp }),
    )
    .await?;

    Ok(application_id)
}

/// Cancels a posted credit note: refuses if any amount has been applied to
/// an invoice, otherwise reverses the GL journal and walks every allocation's
/// avg-cost adjustment back out.
pub async fn cancel_credit_note(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    credit_note_id: Uuid,
    warehouse_id: Option<Uuid>,
    reversal_date: NaiveDate,
) -> CoreResult<()> {
    let note = supplier_credit_repo::find_credit_note(tx, ctx.company_id, credit_note_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("supplier credit note not found".to_string()))?;
    if note.status != "posted" {
        return Err(CoreError::Precondition("credit note is not posted".to_string()));
    }

    let applications = supplier_credit_repo::applications_for_credit_note(tx, credit_note_id).await?;
    if !applications.is_empty() {
        return Err(CoreError::Precondition(
            "cannot cancel a credit note with applications against an invoice".to_string(),
        ));
    }

    period_lock::assert_period_open(ctx, tx, reversal_date).await?;

    let journal_no = numbering::next_document_no(tx, ctx.company_id, "gl_journal", "JRN-").await?;
    gl_posting::reverse_journal(
        ctx,
        tx,
        "supplier_credit_note",
        &credit_note_id.to_string(),
        &journal_no,
        reversal_date,
    )
    .await?;

    if note.kind == "receipt" {
        let warehouse_id = warehouse_id
            .ok_or_else(|| CoreError::Validation("receipt-linked credit requires a warehouse".to_string()))?;
        let allocations = supplier_credit_repo::allocations_for_credit_note(tx, credit_note_id).await?;
        for alloc in &allocations {
            if let Some(batch_id) = alloc.batch_id {
                if !alloc.inventory_usd.is_zero() || !alloc.inventory_lbp.is_zero() {
                    let item_id = batch_repo::item_id_for_batch(tx, batch_id)
                        .await?
                        .ok_or_else(|| CoreError::NotFound("batch not found".to_string()))?;
                    inventory::apply_cost_adjustment(
                        ctx,
                        tx,
                        item_id,
                        warehouse_id,
                        -alloc.inventory_usd,
                        -alloc.inventory_lbp,
                        "supplier_credit_note_cancel",
                        &credit_note_id.to_string(),
                    )
                    .await?;
                }
            }
        }
        supplier_credit_repo::delete_allocations_for_credit_note(tx, credit_note_id).await?;
    }

    supplier_credit_repo::set_credit_note_canceled(tx, credit_note_id).await?;

    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "purchasing.supplier_credit_note.cancel",
        "supplier_credit_note",
        &credit_note_id.to_string(),
        serde_json::json!({}),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(value_usd: Decimal, qty: Decimal, on_hand: Decimal) -> ReceiptLineForCredit {
        ReceiptLineForCredit {
            goods_receipt_line_id: Uuid::new_v4(),
            batch_id: Some(Uuid::new_v4()),
            line_value_usd: value_usd,
            line_value_lbp: value_usd * dec!(89_500),
            line_qty: qty,
            on_hand_qty: on_hand,
        }
    }

    #[test]
    fn splits_proportional_to_line_value_and_sums_exactly() {
        let lines = vec![line(dec!(100), dec!(10), dec!(10)), line(dec!(300), dec!(10), dec!(10))];
        let allocations = allocate_receipt_credit(&lines, dec!(40), dec!(3_580_000)).unwrap();
        assert_eq!(allocations.len(), 2);
        let total_usd: Decimal = allocations.iter().map(|a| a.alloc_usd).sum();
        let total_lbp: Decimal = allocations.iter().map(|a| a.alloc_lbp).sum();
        assert_eq!(total_usd, dec!(40));
        assert_eq!(total_lbp, dec!(3_580_000));
        assert_eq!(allocations[0].alloc_usd, dec!(10));
        assert_eq!(allocations[1].alloc_usd, dec!(30));
    }

    #[test]
    fn falls_back_to_qty_weight_when_every_line_is_zero_value() {
        let lines = vec![line(dec!(0), dec!(5), dec!(5)), line(dec!(0), dec!(15), dec!(15))];
        let allocations = allocate_receipt_credit(&lines, dec!(20), dec!(0)).unwrap();
        assert_eq!(allocations[0].alloc_usd, dec!(5));
        assert_eq!(allocations[1].alloc_usd, dec!(15));
    }

    #[test]
    fn splits_each_line_between_inventory_and_cogs_by_on_hand_ratio() {
        let lines = vec![line(dec!(100), dec!(10), dec!(4))];
        let allocations = allocate_receipt_credit(&lines, dec!(100), dec!(0)).unwrap();
        assert_eq!(allocations[0].inventory_usd, dec!(40));
        assert_eq!(allocations[0].cogs_usd, dec!(60));
    }

    #[test]
    fn fully_sold_line_books_entirely_to_cogs() {
        let lines = vec![line(dec!(100), dec!(10), dec!(0))];
        let allocations = allocate_receipt_credit(&lines, dec!(50), dec!(0)).unwrap();
        assert_eq!(allocations[0].inventory_usd, Decimal::ZERO);
        assert_eq!(allocations[0].cogs_usd, dec!(50));
    }

    #[test]
    fn rejects_empty_line_list() {
        assert!(allocate_receipt_credit(&[], dec!(10), dec!(0)).is_err());
    }
}
