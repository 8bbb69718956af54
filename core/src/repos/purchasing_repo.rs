//! Backs C8 (PO/GR/SI state machine).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::purchasing::{
    GoodsReceipt, GoodsReceiptLine, PurchaseOrder, PurchaseOrderLine, SupplierInvoice, SupplierInvoiceLine,
    SupplierPayment,
};

pub async fn find_po(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    id: Uuid,
) -> Result<Option<PurchaseOrder>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseOrder>(
        "SELECT id, company_id, supplier_id, order_no, status, exchange_rate, order_date FROM purchase_orders WHERE company_id = $1 AND id = $2 FOR UPDATE",
    )
    .bind(company_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn po_lines(
    tx: &mut Transaction<'_, Postgres>,
    po_id: Uuid,
) -> Result<Vec<PurchaseOrderLine>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseOrderLine>(
        "SELECT id, purchase_order_id, item_id, qty_ordered, unit_cost_usd, unit_cost_lbp FROM purchase_order_lines WHERE purchase_order_id = $1",
    )
    .bind(po_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn set_po_posted(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    order_no: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE purchase_orders SET status = 'posted', order_no = COALESCE(order_no, $2) WHERE id = $1")
        .bind(id)
        .bind(order_no)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Sum of posted-GR quantities per PO line, for computing remaining qty.
pub async fn received_qty_by_po_line(
    tx: &mut Transaction<'_, Postgres>,
    po_line_id: Uuid,
) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(grl.qty_received), 0)
        FROM goods_receipt_lines grl
        JOIN goods_receipts gr ON gr.id = grl.goods_receipt_id
        WHERE grl.purchase_order_line_id = $1 AND gr.status = 'posted'
        "#,
    )
    .bind(po_line_id)
    .fetch_one(&mut **tx)
    .await
}

pub async fn find_gr(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    id: Uuid,
) -> Result<Option<GoodsReceipt>, sqlx::Error> {
    sqlx::query_as::<_, GoodsReceipt>(
        r#"
        SELECT id, company_id, purchase_order_id, supplier_id, warehouse_id, receipt_no, status, exchange_rate, receipt_date
        FROM goods_receipts WHERE company_id = $1 AND id = $2 FOR UPDATE
        "#,
    )
    .bind(company_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn gr_lines(
    tx: &mut Transaction<'_, Postgres>,
    gr_id: Uuid,
) -> Result<Vec<GoodsReceiptLine>, sqlx::Error> {
    sqlx::query_as::<_, GoodsReceiptLine>(
        r#"
        SELECT id, goods_receipt_id, purchase_order_line_id, item_id, location_id, qty_received,
               unit_cost_usd, unit_cost_lbp, batch_no, expiry_date
        FROM goods_receipt_lines WHERE goods_receipt_id = $1
        "#,
    )
    .bind(gr_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn set_gr_posted(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    receipt_no: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE goods_receipts SET status = 'posted', receipt_no = COALESCE(receipt_no, $2) WHERE id = $1")
        .bind(id)
        .bind(receipt_no)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn set_gr_canceled(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE goods_receipts SET status = 'canceled' WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Creates a draft goods receipt header carried over from a PO's remaining
/// lines (spec.md §4.8's "GR draft from PO" transition).
#[allow(clippy::too_many_arguments)]
pub async fn insert_draft_goods_receipt(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    purchase_order_id: Option<Uuid>,
    supplier_id: Uuid,
    warehouse_id: Uuid,
    exchange_rate: Decimal,
    receipt_date: NaiveDate,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO goods_receipts
            (id, company_id, purchase_order_id, supplier_id, warehouse_id, receipt_no, status, exchange_rate, receipt_date)
        VALUES ($1, $2, $3, $4, $5, NULL, 'draft', $6, $7)
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(purchase_order_id)
    .bind(supplier_id)
    .bind(warehouse_id)
    .bind(exchange_rate)
    .bind(receipt_date)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

/// Inserts one draft receipt line carried at the PO line's unit costs; batch
/// and expiry are left for the receiving clerk to fill in before posting.
#[allow(clippy::too_many_arguments)]
pub async fn insert_gr_line(
    tx: &mut Transaction<'_, Postgres>,
    goods_receipt_id: Uuid,
    purchase_order_line_id: Option<Uuid>,
    item_id: Uuid,
    location_id: Uuid,
    qty_received: Decimal,
    unit_cost_usd: Decimal,
    unit_cost_lbp: Decimal,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO goods_receipt_lines
            (id, goods_receipt_id, purchase_order_line_id, item_id, location_id, qty_received,
             unit_cost_usd, unit_cost_lbp, batch_no, expiry_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, NULL)
        "#,
    )
    .bind(id)
    .bind(goods_receipt_id)
    .bind(purchase_order_line_id)
    .bind(item_id)
    .bind(location_id)
    .bind(qty_received)
    .bind(unit_cost_usd)
    .bind(unit_cost_lbp)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

/// True if any non-canceled supplier invoice references this receipt.
pub async fn gr_has_active_invoice(
    tx: &mut Transaction<'_, Postgres>,
    gr_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM supplier_invoices WHERE goods_receipt_id = $1 AND status != 'canceled'",
    )
    .bind(gr_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count > 0)
}

pub async fn find_si(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    id: Uuid,
) -> Result<Option<SupplierInvoice>, sqlx::Error> {
    sqlx::query_as::<_, SupplierInvoice>(
        r#"
        SELECT id, company_id, goods_receipt_id, supplier_id, invoice_no, status, doc_subtype,
               is_on_hold, hold_reason, hold_details, import_status, tax_code, exchange_rate, invoice_date
        FROM supplier_invoices WHERE company_id = $1 AND id = $2 FOR UPDATE
        "#,
    )
    .bind(company_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn si_lines(
    tx: &mut Transaction<'_, Postgres>,
    si_id: Uuid,
) -> Result<Vec<SupplierInvoiceLine>, sqlx::Error> {
    sqlx::query_as::<_, SupplierInvoiceLine>(
        r#"
        SELECT id, supplier_invoice_id, goods_receipt_line_id, item_id, qty, unit_cost_usd, unit_cost_lbp,
               line_total_usd, line_total_lbp
        FROM supplier_invoice_lines WHERE supplier_invoice_id = $1
        "#,
    )
    .bind(si_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn invoiced_qty_by_gr_line(
    tx: &mut Transaction<'_, Postgres>,
    gr_line_id: Uuid,
) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(sil.qty), 0)
        FROM supplier_invoice_lines sil
        JOIN supplier_invoices si ON si.id = sil.supplier_invoice_id
        WHERE sil.goods_receipt_line_id = $1 AND si.status != 'canceled'
        "#,
    )
    .bind(gr_line_id)
    .fetch_one(&mut **tx)
    .await
}

pub async fn set_si_posted(tx: &mut Transaction<'_, Postgres>, id: Uuid, invoice_no: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_invoices SET status = 'posted', invoice_no = COALESCE(invoice_no, $2) WHERE id = $1")
        .bind(id)
        .bind(invoice_no)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn set_si_canceled(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_invoices SET status = 'canceled' WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn set_si_hold(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    reason: &str,
    details: serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_invoices SET is_on_hold = true, hold_reason = $2, hold_details = $3 WHERE id = $1")
        .bind(id)
        .bind(reason)
        .bind(details)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn clear_si_hold(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_invoices SET is_on_hold = false, hold_reason = NULL, hold_details = NULL WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn si_has_payments(tx: &mut Transaction<'_, Postgres>, si_id: Uuid) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM supplier_payments WHERE supplier_invoice_id = $1")
        .bind(si_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(count > 0)
}

pub async fn insert_payment(
    tx: &mut Transaction<'_, Postgres>,
    si_id: Uuid,
    amount_usd: Decimal,
    amount_lbp: Decimal,
    payment_method: &str,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO supplier_payments (id, supplier_invoice_id, amount_usd, amount_lbp, payment_method) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(si_id)
    .bind(amount_usd)
    .bind(amount_lbp)
    .bind(payment_method)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn payments_for_invoice(
    tx: &mut Transaction<'_, Postgres>,
    si_id: Uuid,
) -> Result<Vec<SupplierPayment>, sqlx::Error> {
    sqlx::query_as::<_, SupplierPayment>(
        "SELECT id, supplier_invoice_id, amount_usd, amount_lbp, payment_method FROM supplier_payments WHERE supplier_invoice_id = $1",
    )
    .bind(si_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn exchange_rate_for(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    rate_date: NaiveDate,
    rate_type: &str,
) -> Result<Option<Decimal>, sqlx::Error> {
    if let Some(rate) = sqlx::query_scalar::<_, Decimal>(
        "SELECT usd_to_lbp FROM exchange_rates WHERE company_id = $1 AND rate_date = $2 AND rate_type = $3",
    )
    .bind(company_id)
    .bind(rate_date)
    .bind(rate_type)
    .fetch_optional(&mut **tx)
    .await?
    {
        return Ok(Some(rate));
    }

    sqlx::query_scalar(
        "SELECT usd_to_lbp FROM exchange_rates WHERE company_id = $1 AND rate_type = $2 ORDER BY rate_date DESC LIMIT 1",
    )
    .bind(company_id)
    .bind(rate_type)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn tax_code_rate(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    tax_code: &str,
) -> Result<Option<Decimal>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT rate FROM tax_codes WHERE company_id = $1 AND code = $2 AND is_active = true",
    )
    .bind(company_id)
    .bind(tax_code)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn item_primary_tax_code(
    tx: &mut Transaction<'_, Postgres>,
    item_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT primary_tax_code FROM items WHERE id = $1")
        .bind(item_id)
        .fetch_one(&mut **tx)
        .await
}

/// Creates a bare draft purchase order header with no lines — the write
/// side effect of an approved `AI_PURCHASE` recommendation. Lines are left
/// for the buyer to fill in before posting.
pub async fn insert_draft_purchase_order(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    supplier_id: Uuid,
    order_date: NaiveDate,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO purchase_orders (id, company_id, supplier_id, order_no, status, exchange_rate, order_date)
        VALUES ($1, $2, $3, NULL, 'draft', 1, $4)
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(supplier_id)
    .bind(order_date)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

/// Creates the draft invoice the import pipeline's upload step
/// materializes before extraction runs (spec.md §4.10). The supplier is
/// fixed at upload time (chosen by the uploader, e.g. "this came from
/// Acme's portal") since `supplier_invoices.supplier_id` is required;
/// everything else — items, quantities, costs — is left to extraction and
/// review.
pub async fn insert_draft_invoice_for_import(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    supplier_id: Uuid,
    exchange_rate: Decimal,
    invoice_date: NaiveDate,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO supplier_invoices
            (id, company_id, goods_receipt_id, supplier_id, invoice_no, status, doc_subtype,
             is_on_hold, hold_reason, hold_details, import_status, tax_code, exchange_rate, invoice_date)
        VALUES ($1, $2, NULL, $3, NULL, 'draft', 'standard', false, NULL, NULL, 'pending', NULL, $4, $5)
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(supplier_id)
    .bind(exchange_rate)
    .bind(invoice_date)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

/// Creates a draft invoice carried over from a receipt's remaining lines
/// (spec.md §4.8's "SI draft from GR" transition). Unlike
/// `insert_draft_invoice_for_import`, the receipt is already known, so
/// `import_status` stays `'none'` rather than entering the extraction queue.
pub async fn insert_draft_invoice_from_receipt(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    goods_receipt_id: Uuid,
    supplier_id: Uuid,
    exchange_rate: Decimal,
    invoice_date: NaiveDate,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO supplier_invoices
            (id, company_id, goods_receipt_id, supplier_id, invoice_no, status, doc_subtype,
             is_on_hold, hold_reason, hold_details, import_status, tax_code, exchange_rate, invoice_date)
        VALUES ($1, $2, $3, $4, NULL, 'draft', 'standard', false, NULL, NULL, 'none', NULL, $5, $6)
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(goods_receipt_id)
    .bind(supplier_id)
    .bind(exchange_rate)
    .bind(invoice_date)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn set_si_import_status(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    import_status: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_invoices SET import_status = $2 WHERE id = $1")
        .bind(id)
        .bind(import_status)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Inserts one materialized invoice line at factor=1/base UOM, per the
/// import pipeline's apply step (spec.md §4.10). `line_total` is derived
/// here rather than trusted from the caller so it can never drift from
/// `qty * unit_cost`.
pub async fn insert_si_line(
    tx: &mut Transaction<'_, Postgres>,
    si_id: Uuid,
    goods_receipt_line_id: Option<Uuid>,
    item_id: Uuid,
    qty: Decimal,
    unit_cost_usd: Decimal,
    unit_cost_lbp: Decimal,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let line_total_usd = crate::money::q_usd(qty * unit_cost_usd);
    let line_total_lbp = crate::money::q_lbp(qty * unit_cost_lbp);
    sqlx::query(
        r#"
        INSERT INTO supplier_invoice_lines
            (id, supplier_invoice_id, goods_receipt_line_id, item_id, qty, unit_cost_usd, unit_cost_lbp,
             line_total_usd, line_total_lbp)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(id)
    .bind(si_id)
    .bind(goods_receipt_line_id)
    .bind(item_id)
    .bind(qty)
    .bind(unit_cost_usd)
    .bind(unit_cost_lbp)
    .bind(line_total_usd)
    .bind(line_total_lbp)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn delete_si_lines(tx: &mut Transaction<'_, Postgres>, si_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM supplier_invoice_lines WHERE supplier_invoice_id = $1")
        .bind(si_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Sum of tax already recorded for a posted invoice, for the credit-
/// application open-balance computation (spec.md §4.9).
pub async fn invoice_tax_total(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    si_id: Uuid,
) -> Result<(Decimal, Decimal), sqlx::Error> {
    let row: (Decimal, Decimal) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(tax_usd), 0), COALESCE(SUM(tax_lbp), 0)
        FROM tax_lines
        WHERE company_id = $1 AND source_type = 'supplier_invoice' AND source_id = $2
        "#,
    )
    .bind(company_id)
    .bind(si_id.to_string())
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}
