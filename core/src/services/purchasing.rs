//! Purchasing State Machine (C8): PO → GR → SI, with the AP 3-way match.
//!
//! Grounded in `routers/purchases.py`'s post/cancel handlers. The
//! variance-detection rules in [`run_three_way_match`] are pure and
//! unit-tested in isolation from the orchestration functions that drive
//! the document lifecycle through the repos.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::context::Ctx;
use crate::domain::purchasing::{ApThreeWayThresholds, MatchFlag};
use crate::error::{CoreError, CoreResult};
use crate::money::DualAmount;
use crate::repos::purchasing_repo;
use crate::services::{account_defaults, gl_posting, period_lock};

/// One invoice line's observable facts, gathered by the caller from the
/// linked PO/GR lines before calling [`run_three_way_match`].
#[derive(Debug, Clone)]
pub struct MatchLineInput {
    pub goods_receipt_line_id: Uuid,
    pub invoiced_qty: Decimal,
    pub already_invoiced_qty: Decimal,
    pub received_qty: Decimal,
    pub invoice_unit_cost_usd: Decimal,
    pub invoice_unit_cost_lbp: Decimal,
    pub expected_unit_cost_usd: Decimal,
    pub expected_unit_cost_lbp: Decimal,
    pub line_total_lbp: Decimal,
    pub item_tax_rate: Option<Decimal>,
}

/// Header facts needed for the tax-variance check.
#[derive(Debug, Clone)]
pub struct MatchHeaderInput {
    pub invoice_tax_rate: Decimal,
    pub invoice_tax_lbp: Decimal,
    pub base_lbp: Decimal,
}

/// §4.8's qty/cost/tax variance rules, evaluated against the configured
/// [`ApThreeWayThresholds`]. Pure — no I/O, so fully covered by inline
/// tests instead of integration fixtures.
pub fn run_three_way_match(
    lines: &[MatchLineInput],
    header: &MatchHeaderInput,
    thresholds: &ApThreeWayThresholds,
) -> Vec<MatchFlag> {
    let mut flags = Vec::new();

    for line in lines {
        let total_invoiced = line.already_invoiced_qty + line.invoiced_qty;
        if total_invoiced > line.received_qty + thresholds.qty_epsilon {
            flags.push(MatchFlag::QtyExceedsReceived {
                goods_receipt_line_id: line.goods_receipt_line_id,
                invoiced_qty: line.invoiced_qty,
                received_qty: line.received_qty,
            });
        }

        if let Some(flag) = unit_cost_variance(line, thresholds) {
            flags.push(flag);
        }
    }

    let mut expected_tax_lbp = Decimal::ZERO;
    let mut mismatched_lines = 0;
    for line in lines {
        let eff_rate = line.item_tax_rate.unwrap_or(header.invoice_tax_rate);
        expected_tax_lbp += line.line_total_lbp * eff_rate;
        if line.item_tax_rate.is_some_and(|r| r != header.invoice_tax_rate) {
            mismatched_lines += 1;
        }
    }
    let expected_tax_lbp = crate::money::q_lbp(expected_tax_lbp);

    if mismatched_lines > 0 && header.base_lbp > Decimal::ZERO {
        let diff = (expected_tax_lbp - header.invoice_tax_lbp).abs();
        let pct = diff / header.base_lbp;
        if diff >= thresholds.tax_diff_lbp_threshold && pct >= thresholds.tax_diff_pct_threshold {
            flags.push(MatchFlag::TaxVariance {
                expected_tax_lbp,
                actual_tax_lbp: header.invoice_tax_lbp,
                diff_lbp: diff,
                pct,
            });
        }
    }

    flags
}

fn unit_cost_variance(line: &MatchLineInput, thresholds: &ApThreeWayThresholds) -> Option<MatchFlag> {
    let usd_var = (line.invoice_unit_cost_usd - line.expected_unit_cost_usd).abs();

    if line.expected_unit_cost_usd.is_zero() && !line.invoice_unit_cost_lbp.is_zero() {
        let lbp_var = (line.invoice_unit_cost_lbp - line.expected_unit_cost_lbp).abs();
        if lbp_var >= thresholds.abs_lbp_threshold {
            return Some(MatchFlag::UnitCostVariance {
                goods_receipt_line_id: line.goods_receipt_line_id,
                expected_usd: line.expected_unit_cost_usd,
                actual_usd: line.invoice_unit_cost_usd,
                expected_lbp: line.expected_unit_cost_lbp,
                actual_lbp: line.invoice_unit_cost_lbp,
                pct: None,
            });
        }
        return None;
    }

    if line.expected_unit_cost_usd.is_zero() {
        return None;
    }

    let pct = usd_var / line.expected_unit_cost_usd;
    if usd_var >= thresholds.abs_usd_threshold && pct >= thresholds.pct_threshold {
        return Some(MatchFlag::UnitCostVariance {
            goods_receipt_line_id: line.goods_receipt_line_id,
            expected_usd: line.expected_unit_cost_usd,
            actual_usd: line.invoice_unit_cost_usd,
            expected_lbp: line.expected_unit_cost_lbp,
            actual_lbp: line.invoice_unit_cost_lbp,
            pct: Some(pct),
        });
    }
    None
}

/// §4.8 PO post: requires ≥1 line, assigns a number if missing, emits
/// `purchase.ordered`. Idempotent: returns the existing number if already
/// posted.
pub async fn post_purchase_order(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    po_id: Uuid,
) -> CoreResult<String> {
    let po = purchasing_repo::find_po(tx, ctx.company_id, po_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("purchase order not found".to_string()))?;

    if po.status == "posted" {
        return po
            .order_no
            .ok_or_else(|| CoreError::Conflict {
                message: "purchase order posted without an order number".to_string(),
                details: None,
            });
    }

    let lines = purchasing_repo::po_lines(tx, po_id).await?;
    if lines.is_empty() {
        return Err(CoreError::Validation(
            "purchase order requires at least one line".to_string(),
        ));
    }

    let order_no = numbering::next_document_no(tx, ctx.company_id, "purchase_order", "PO-").await?;
    purchasing_repo::set_po_posted(tx, po_id, &order_no).await?;

    crate::repos::outbox_repo::append_domain_event(
        tx,
        ctx.company_id,
        "purchase.ordered",
        serde_json::json!({ "purchase_order_id": po_id, "order_no": order_no }),
    )
    .await?;

    Ok(order_no)
}

/// §4.8 "GR draft from PO": prefills one receipt line per PO line still
/// outstanding (`qty_ordered` minus the posted-GR sum), carried at the
/// PO's unit costs. A PO can be partially received many times over, so
/// lines already fully received are skipped rather than zeroed out.
/// Warehouse and location are caller-supplied since a PO isn't
/// warehouse-scoped.
pub async fn draft_goods_receipt_from_po(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    po_id: Uuid,
    warehouse_id: Uuid,
    location_id: Uuid,
    receipt_date: NaiveDate,
) -> CoreResult<Uuid> {
    let po = purchasing_repo::find_po(tx, ctx.company_id, po_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("purchase order not found".to_string()))?;
    if po.status != "posted" {
        return Err(CoreError::Precondition(
            "purchase order must be posted before a receipt can be drafted from it".to_string(),
        ));
    }

    let lines = purchasing_repo::po_lines(tx, po_id).await?;
    let gr_id = purchasing_repo::insert_draft_goods_receipt(
        tx,
        ctx.company_id,
        Some(po_id),
        po.supplier_id,
        warehouse_id,
        po.exchange_rate,
        receipt_date,
    )
    .await?;

    let mut lines_drafted = 0;
    for line in &lines {
        let already_received = purchasing_repo::received_qty_by_po_line(tx, line.id).await?;
        let remaining = line.qty_ordered - already_received;
        if remaining <= Decimal::ZERO {
            continue;
        }
        purchasing_repo::insert_gr_line(
            tx,
            gr_id,
            Some(line.id),
            line.item_id,
            location_id,
            remaining,
            line.unit_cost_usd,
            line.unit_cost_lbp,
        )
        .await?;
        lines_drafted += 1;
    }

    if lines_drafted == 0 {
        return Err(CoreError::Precondition(
            "purchase order has nothing left to receive".to_string(),
        ));
    }

    Ok(gr_id)
}

/// §4.8 "SI draft from GR": prefills one invoice line per receipt line
/// still outstanding (`qty_received` minus the already-invoiced sum),
/// carried at the receipt's unit costs. Mirrors
/// [`draft_goods_receipt_from_po`] one stage later in the chain.
pub async fn draft_supplier_invoice_from_receipt(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    gr_id: Uuid,
    invoice_date: NaiveDate,
) -> CoreResult<Uuid> {
    let gr = purchasing_repo::find_gr(tx, ctx.company_id, gr_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("goods receipt not found".to_string()))?;
    if gr.status != "posted" {
        return Err(CoreError::Precondition(
            "goods receipt must be posted before an invoice can be drafted from it".to_string(),
        ));
    }

    let lines = purchasing_repo::gr_lines(tx, gr_id).await?;
    let si_id = purchasing_repo::insert_draft_invoice_from_receipt(
        tx,
        ctx.company_id,
        gr_id,
        gr.supplier_id,
        gr.exchange_rate,
        invoice_date,
    )
    .await?;

    let mut lines_drafted = 0;
    for line in &lines {
        let already_invoiced = purchasing_repo::invoiced_qty_by_gr_line(tx, line.id).await?;
        let remaining = line.qty_received - already_invoiced;
        if remaining <= Decimal::ZERO {
            continue;
        }
        purchasing_repo::insert_si_line(
            tx,
            si_id,
            Some(line.id),
            line.item_id,
            remaining,
            line.unit_cost_usd,
            line.unit_cost_lbp,
        )
        .await?;
        lines_drafted += 1;
    }

    if lines_drafted == 0 {
        return Err(CoreError::Precondition(
            "goods receipt has nothing left to invoice".to_string(),
        ));
    }

    Ok(si_id)
}

/// §4.8 GR post. Idempotent on retry: if already posted with artifacts
/// (a GL journal exists), returns without re-emitting; if posted but
/// artifacts are missing, that's a data-integrity conflict, not a retry.
pub async fn post_goods_receipt(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    gr_id: Uuid,
    posting_date: Option<NaiveDate>,
) -> CoreResult<(String, Uuid)> {
    let gr = purchasing_repo::find_gr(tx, ctx.company_id, gr_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("goods receipt not found".to_string()))?;

    let effective_date = posting_date.unwrap_or(gr.receipt_date);

    if gr.status == "posted" {
        if let Some(existing) = crate::repos::gl_repo::find_journal_by_source(
            tx,
            ctx.company_id,
            "goods_receipt",
            &gr_id.to_string(),
        )
        .await?
        {
            return Ok((gr.receipt_no.unwrap_or_default(), existing.id));
        }
        return Err(CoreError::conflict(
            "goods receipt posted but no journal artifacts found",
            None,
        ));
    }

    period_lock::assert_period_open(ctx, tx, effective_date).await?;

    let lines = purchasing_repo::gr_lines(tx, gr_id).await?;
    let mut total = DualAmount::zero();

    for line in &lines {
        crate::services::inventory::assert_active_location(tx, gr.warehouse_id, line.location_id).await?;

        let item = crate::repos::item_repo::find_item(tx, ctx.company_id, line.item_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("item not found".to_string()))?;

        let batch_id = if item.track_batches || item.track_expiry {
            let expiry = line.expiry_date.or_else(|| {
                crate::services::batch::derive_expiry_date(effective_date, item.default_shelf_life_days)
            });
            let batch = match crate::repos::batch_repo::find_batch(tx, line.item_id, line.batch_no.as_deref(), expiry).await? {
                Some(b) => b.id,
                None => crate::repos::batch_repo::create_batch(tx, line.item_id, line.batch_no.as_deref(), expiry).await?,
            };
            crate::repos::batch_repo::stamp_received_metadata_if_absent(
                tx,
                batch,
                "goods_receipt",
                &gr_id.to_string(),
                gr.supplier_id,
                chrono::Utc::now(),
            )
            .await?;
            Some(batch)
        } else {
            None
        };

        crate::services::inventory::emit_stock_move(
            ctx,
            tx,
            line.item_id,
            gr.warehouse_id,
            Some(line.location_id),
            batch_id,
            crate::services::inventory::MoveQuantities::inbound(line.qty_received),
            line.unit_cost_usd,
            line.unit_cost_lbp,
            effective_date,
            "goods_receipt",
            &gr_id.to_string(),
        )
        .await?;

        if let Some(batch_id) = batch_id {
            let landed_usd = line.qty_received * line.unit_cost_usd;
            let landed_lbp = line.qty_received * line.unit_cost_lbp;
            crate::repos::batch_repo::insert_cost_layer(
                tx,
                batch_id,
                gr.warehouse_id,
                Some(line.location_id),
                "goods_receipt",
                &gr_id.to_string(),
                &line.id.to_string(),
                line.qty_received,
                line.unit_cost_usd,
                line.unit_cost_lbp,
                landed_usd,
                landed_lbp,
            )
            .await?;
        }

        total = total.add(DualAmount::new(
            line.qty_received * line.unit_cost_usd,
            line.qty_received * line.unit_cost_lbp,
        ));
    }

    let inventory_account = account_defaults::account_for_role(ctx, "INVENTORY").await?;
    let grni_account = account_defaults::account_for_role(ctx, "GRNI").await?;

    let entries = vec![
        crate::domain::gl::GlEntryDraft::debit(inventory_account, total, "goods receipt"),
        crate::domain::gl::GlEntryDraft::credit(grni_account, total, "goods receipt"),
    ];

    let journal_no = numbering::next_document_no(tx, ctx.company_id, "gl_journal", "JRN-").await?;
    let journal_id = gl_posting::post_journal(
        ctx,
        tx,
        gl_posting::PostJournalRequest {
            company_id: ctx.company_id,
            journal_no: &journal_no,
            source_type: "goods_receipt",
            source_id: &gr_id.to_string(),
            journal_date: effective_date,
            rate_type: "official",
            exchange_rate: gr.exchange_rate,
            memo: Some("goods receipt"),
            entries,
        },
    )
    .await?;

    let receipt_no = numbering::next_document_no(tx, ctx.company_id, "goods_receipt", "GR-").await?;
    purchasing_repo::set_gr_posted(tx, gr_id, &receipt_no).await?;

    crate::repos::outbox_repo::append_domain_event(
        tx,
        ctx.company_id,
        "purchase.received",
        serde_json::json!({ "goods_receipt_id": gr_id, "receipt_no": receipt_no }),
    )
    .await?;

    Ok((receipt_no, journal_id))
}

/// §4.8 GR cancel: blocked while any non-canceled invoice references it.
pub async fn cancel_goods_receipt(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    gr_id: Uuid,
) -> CoreResult<()> {
    if purchasing_repo::gr_has_active_invoice(tx, gr_id).await? {
        return Err(CoreError::Precondition(
            "goods receipt has an active supplier invoice".to_string(),
        ));
    }

    let moves = crate::repos::batch_repo::moves_for_source(tx, ctx.company_id, "goods_receipt", &gr_id.to_string()).await?;
    for mv in &moves {
        crate::services::inventory::emit_stock_move(
            ctx,
            tx,
            mv.item_id,
            mv.warehouse_id,
            mv.location_id,
            mv.batch_id,
            crate::services::inventory::MoveQuantities::outbound(mv.qty_in),
            mv.unit_cost_usd,
            mv.unit_cost_lbp,
            mv.move_date,
            "goods_receipt_cancel",
            &gr_id.to_string(),
        )
        .await?;
    }

    let journal_no = numbering::next_document_no(tx, ctx.company_id, "gl_journal", "JRN-").await?;
    gl_posting::reverse_journal(
        ctx,
        tx,
        "goods_receipt",
        &gr_id.to_string(),
        &journal_no,
        chrono::Utc::now().date_naive(),
    )
    .await?;

    crate::repos::batch_repo::delete_cost_layers_for_source(tx, "goods_receipt", &gr_id.to_string()).await?;
    purchasing_repo::set_gr_canceled(tx, gr_id).await?;
    Ok(())
}

/// §4.8 SI post. Computes tax from the header rate, runs the 3-way match
/// when linked to a GR, and holds on any produced flag rather than
/// posting partway.
pub async fn post_supplier_invoice(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    si_id: Uuid,
    posting_date: Option<NaiveDate>,
    thresholds: &ApThreeWayThresholds,
) -> CoreResult<Uuid> {
    let si = purchasing_repo::find_si(tx, ctx.company_id, si_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("supplier invoice not found".to_string()))?;

    if si.status != "draft" {
        return Err(CoreError::Precondition("supplier invoice is not a draft".to_string()));
    }
    if si.is_on_hold {
        return Err(CoreError::Precondition("supplier invoice is on hold".to_string()));
    }

    let effective_date = posting_date.unwrap_or(si.invoice_date);
    period_lock::assert_period_open(ctx, tx, effective_date).await?;

    if let Some(existing) =
        crate::repos::gl_repo::find_journal_by_source(tx, ctx.company_id, "supplier_invoice", &si_id.to_string())
            .await?
    {
        return Err(CoreError::conflict(
            "supplier invoice already has posted GL artifacts",
            Some(serde_json::json!({ "journal_id": existing.id })),
        ));
    }

    let lines = purchasing_repo::si_lines(tx, si_id).await?;

    if si.goods_receipt_id.is_some() {
        let mut match_lines = Vec::with_capacity(lines.len());
        for line in &lines {
            let Some(gr_line_id) = line.goods_receipt_line_id else {
                continue;
            };
            let already_invoiced = purchasing_repo::invoiced_qty_by_gr_line(tx, gr_line_id).await?;
            let item_tax_code = purchasing_repo::item_primary_tax_code(tx, line.item_id).await?;
            let item_tax_rate = match item_tax_code {
                Some(code) => purchasing_repo::tax_code_rate(tx, ctx.company_id, &code).await?,
                None => None,
            };
            match_lines.push(MatchLineInput {
                goods_receipt_line_id: gr_line_id,
                invoiced_qty: line.qty,
                already_invoiced_qty: already_invoiced,
                received_qty: line.qty,
                invoice_unit_cost_usd: line.unit_cost_usd,
                invoice_unit_cost_lbp: line.unit_cost_lbp,
                expected_unit_cost_usd: line.unit_cost_usd,
                expected_unit_cost_lbp: line.unit_cost_lbp,
                line_total_lbp: line.line_total_lbp,
                item_tax_rate,
            });
        }

        let base_lbp: Decimal = lines.iter().map(|l| l.line_total_lbp).sum();
        let tax_rate = match &si.tax_code {
            Some(code) => purchasing_repo::tax_code_rate(tx, ctx.company_id, code).await?.unwrap_or(Decimal::ZERO),
            None => Decimal::ZERO,
        };
        let header = MatchHeaderInput {
            invoice_tax_rate: tax_rate,
            invoice_tax_lbp: crate::money::q_lbp(base_lbp * tax_rate),
            base_lbp,
        };

        let flags = run_three_way_match(&match_lines, &header, thresholds);
        if !flags.is_empty() {
            let details = serde_json::json!({ "flags": flags });
            purchasing_repo::set_si_hold(tx, si_id, "ap_3way_match", details.clone()).await?;
            platform_audit::record(
                tx,
                ctx.company_id,
                ctx.user_id,
                "purchasing.supplier_invoice.hold",
                "supplier_invoice",
                &si_id.to_string(),
                details.clone(),
            )
            .await?;
            return Err(CoreError::conflict("supplier invoice failed 3-way match", Some(details)));
        }
    }

    let base_lbp: Decimal = lines.iter().map(|l| l.line_total_lbp).sum();
    let base_usd: Decimal = lines.iter().map(|l| l.line_total_usd).sum();
    let tax_rate = match &si.tax_code {
        Some(code) => purchasing_repo::tax_code_rate(tx, ctx.company_id, code).await?.unwrap_or(Decimal::ZERO),
        None => Decimal::ZERO,
    };
    let tax_lbp = crate::money::q_lbp(base_lbp * tax_rate);
    let tax_usd = if tax_rate.is_zero() {
        Decimal::ZERO
    } else {
        crate::money::q_usd(tax_lbp / si.exchange_rate)
    };

    let ap_account = account_defaults::account_for_role(ctx, "AP").await?;
    let total = DualAmount::new(base_usd + tax_usd, base_lbp + tax_lbp);

    let entries = if si.doc_subtype == "opening_balance" {
        let opening_account = account_defaults::account_for_role(ctx, "OPENING_BALANCE").await?;
        vec![
            crate::domain::gl::GlEntryDraft::debit(opening_account, total, "opening balance invoice"),
            crate::domain::gl::GlEntryDraft::credit(ap_account, total, "opening balance invoice"),
        ]
    } else {
        let grni_account = account_defaults::account_for_role(ctx, "GRNI").await?;
        let base = DualAmount::new(base_usd, base_lbp);
        let mut entries = vec![crate::domain::gl::GlEntryDraft::debit(grni_account, base, "supplier invoice")];
        if !tax_lbp.is_zero() {
            let vat_account = account_defaults::account_for_role(ctx, "VAT_RECOVERABLE").await?;
            entries.push(crate::domain::gl::GlEntryDraft::debit(
                vat_account,
                DualAmount::new(tax_usd, tax_lbp),
                "supplier invoice tax",
            ));
        }
        entries.push(crate::domain::gl::GlEntryDraft::credit(ap_account, total, "supplier invoice"));
        entries
    };

    if !tax_lbp.is_zero() {
        let tax_code = si.tax_code.clone().unwrap_or_default();
        crate::repos::gl_repo::insert_tax_line(
            tx,
            &crate::domain::gl::TaxLine {
                id: Uuid::new_v4(),
                company_id: ctx.company_id,
                source_type: "supplier_invoice".to_string(),
                source_id: si_id.to_string(),
                tax_code,
                base_usd,
                base_lbp,
                tax_usd,
                tax_lbp,
                tax_date: effective_date,
            },
        )
        .await?;
    }

    let journal_no = numbering::next_document_no(tx, ctx.company_id, "gl_journal", "JRN-").await?;
    let journal_id = gl_posting::post_journal(
        ctx,
        tx,
        gl_posting::PostJournalRequest {
            company_id: ctx.company_id,
            journal_no: &journal_no,
            source_type: "supplier_invoice",
            source_id: &si_id.to_string(),
            journal_date: effective_date,
            rate_type: "official",
            exchange_rate: si.exchange_rate,
            memo: Some("supplier invoice"),
            entries,
        },
    )
    .await?;

    let invoice_no = numbering::next_document_no(tx, ctx.company_id, "supplier_invoice", "SI-").await?;
    purchasing_repo::set_si_posted(tx, si_id, &invoice_no).await?;

    crate::repos::outbox_repo::append_domain_event(
        tx,
        ctx.company_id,
        "purchase.invoiced",
        serde_json::json!({ "supplier_invoice_id": si_id, "invoice_no": invoice_no }),
    )
    .await?;

    Ok(journal_id)
}

/// §4.8 SI cancel: blocked while any payment exists.
pub async fn cancel_supplier_invoice(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    si_id: Uuid,
) -> CoreResult<()> {
    if purchasing_repo::si_has_payments(tx, si_id).await? {
        return Err(CoreError::Precondition(
            "supplier invoice has recorded payments".to_string(),
        ));
    }

    let journal_no = numbering::next_document_no(tx, ctx.company_id, "gl_journal", "JRN-").await?;
    gl_posting::reverse_journal(
        ctx,
        tx,
        "supplier_invoice",
        &si_id.to_string(),
        &journal_no,
        chrono::Utc::now().date_naive(),
    )
    .await?;

    purchasing_repo::set_si_canceled(tx, si_id).await?;
    Ok(())
}

pub async fn unhold_supplier_invoice(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    si_id: Uuid,
) -> CoreResult<()> {
    purchasing_repo::clear_si_hold(tx, si_id).await?;
    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "purchasing.supplier_invoice.unhold",
        "supplier_invoice",
        &si_id.to_string(),
        serde_json::json!({}),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn thresholds() -> ApThreeWayThresholds {
        ApThreeWayThresholds::default()
    }

    fn line(invoiced: Decimal, received: Decimal, invoice_usd: Decimal, expected_usd: Decimal) -> MatchLineInput {
        MatchLineInput {
            goods_receipt_line_id: Uuid::new_v4(),
            invoiced_qty: invoiced,
            already_invoiced_qty: Decimal::ZERO,
            received_qty: received,
            invoice_unit_cost_usd: invoice_usd,
            invoice_unit_cost_lbp: invoice_usd * dec!(89_500),
            expected_unit_cost_usd: expected_usd,
            expected_unit_cost_lbp: expected_usd * dec!(89_500),
            line_total_lbp: Decimal::ZERO,
            item_tax_rate: None,
        }
    }

    fn header() -> MatchHeaderInput {
        MatchHeaderInput {
            invoice_tax_rate: dec!(0.11),
            invoice_tax_lbp: dec!(1_000_000),
            base_lbp: dec!(9_090_909),
        }
    }

    #[test]
    fn qty_exceeding_received_is_flagged() {
        let lines = vec![line(dec!(15), dec!(10), dec!(5), dec!(5))];
        let flags = run_three_way_match(&lines, &header(), &thresholds());
        assert!(flags.iter().any(|f| matches!(f, MatchFlag::QtyExceedsReceived { .. })));
    }

    #[test]
    fn qty_within_epsilon_is_not_flagged() {
        let lines = vec![line(dec!(10.0000001), dec!(10), dec!(5), dec!(5))];
        let flags = run_three_way_match(&lines, &header(), &thresholds());
        assert!(!flags.iter().any(|f| matches!(f, MatchFlag::QtyExceedsReceived { .. })));
    }

    #[test]
    fn unit_cost_variance_requires_both_pct_and_abs_thresholds() {
        // 30% variance but only $1.50 absolute -> below abs_usd_threshold, no flag.
        let lines = vec![line(dec!(10), dec!(10), dec!(6.50), dec!(5.00))];
        let flags = run_three_way_match(&lines, &header(), &thresholds());
        assert!(!flags.iter().any(|f| matches!(f, MatchFlag::UnitCostVariance { .. })));
    }

    #[test]
    fn unit_cost_variance_flags_when_both_thresholds_exceeded() {
        let lines = vec![line(dec!(10), dec!(10), dec!(50), dec!(10))];
        let flags = run_three_way_match(&lines, &header(), &thresholds());
        assert!(flags.iter().any(|f| matches!(f, MatchFlag::UnitCostVariance { .. })));
    }

    #[test]
    fn zero_usd_falls_back_to_lbp_variance() {
        let mut l = line(dec!(10), dec!(10), Decimal::ZERO, Decimal::ZERO);
        l.invoice_unit_cost_lbp = dec!(5_000_000);
        l.expected_unit_cost_lbp = dec!(1_000_000);
        let flags = run_three_way_match(&[l], &header(), &thresholds());
        assert!(flags.iter().any(|f| matches!(f, MatchFlag::UnitCostVariance { .. })));
    }

    #[test]
    fn tax_variance_needs_a_rate_mismatch_present() {
        let mut l = line(dec!(10), dec!(10), dec!(5), dec!(5));
        l.item_tax_rate = Some(dec!(0.11));
        let flags = run_three_way_match(&[l], &header(), &thresholds());
        assert!(!flags.iter().any(|f| matches!(f, MatchFlag::TaxVariance { .. })));
    }

    #[test]
    fn tax_variance_flags_on_sufficient_rate_mismatch() {
        let mut l = line(dec!(10), dec!(10), dec!(5), dec!(5));
        l.item_tax_rate = Some(dec!(0.20));
        let mut h = header();
        h.invoice_tax_lbp = dec!(500_000);
        let flags = run_three_way_match(&[l], &h, &thresholds());
        assert!(flags.iter().any(|f| matches!(f, MatchFlag::TaxVariance { .. })));
    }
}
