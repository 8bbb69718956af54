//! Backs C9 (supplier credit notes, receipt-line allocation, invoice
//! applications).

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::supplier_credit::{SupplierCreditAllocation, SupplierCreditApplication, SupplierCreditNote};

#[allow(clippy::too_many_arguments)]
pub async fn create_credit_note(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    supplier_id: Uuid,
    kind: &str,
    goods_receipt_id: Option<Uuid>,
    total_usd: Decimal,
    total_lbp: Decimal,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO supplier_credit_notes
            (id, company_id, supplier_id, kind, goods_receipt_id, total_usd, total_lbp, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft')
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(supplier_id)
    .bind(kind)
    .bind(goods_receipt_id)
    .bind(total_usd)
    .bind(total_lbp)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn find_credit_note(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    id: Uuid,
) -> Result<Option<SupplierCreditNote>, sqlx::Error> {
    sqlx::query_as::<_, SupplierCreditNote>(
        r#"
        SELECT id, company_id, supplier_id, kind, goods_receipt_id, credit_no, total_usd, total_lbp, status
        FROM supplier_credit_notes
        WHERE company_id = $1 AND id = $2
        FOR UPDATE
        "#,
    )
    .bind(company_id)
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn set_credit_note_posted(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    credit_no: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_credit_notes SET status = 'posted', credit_no = COALESCE(credit_no, $2) WHERE id = $1")
        .bind(id)
        .bind(credit_no)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn set_credit_note_canceled(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_credit_notes SET status = 'canceled' WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_allocation(
    tx: &mut Transaction<'_, Postgres>,
    alloc: &SupplierCreditAllocation,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO supplier_credit_allocations
            (id, credit_note_id, goods_receipt_line_id, batch_id, alloc_usd, alloc_lbp,
             inventory_usd, inventory_lbp, cogs_usd, cogs_lbp)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(alloc.id)
    .bind(alloc.credit_note_id)
    .bind(alloc.goods_receipt_line_id)
    .bind(alloc.batch_id)
    .bind(alloc.alloc_usd)
    .bind(alloc.alloc_lbp)
    .bind(alloc.inventory_usd)
    .bind(alloc.inventory_lbp)
    .bind(alloc.cogs_usd)
    .bind(alloc.cogs_lbp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn allocations_for_credit_note(
    tx: &mut Transaction<'_, Postgres>,
    credit_note_id: Uuid,
) -> Result<Vec<SupplierCreditAllocation>, sqlx::Error> {
    sqlx::query_as::<_, SupplierCreditAllocation>(
        r#"
        SELECT id, credit_note_id, goods_receipt_line_id, batch_id, alloc_usd, alloc_lbp,
               inventory_usd, inventory_lbp, cogs_usd, cogs_lbp
        FROM supplier_credit_allocations
        WHERE credit_note_id = $1
        "#,
    )
    .bind(credit_note_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn delete_allocations_for_credit_note(
    tx: &mut Transaction<'_, Postgres>,
    credit_note_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM supplier_credit_allocations WHERE credit_note_id = $1")
        .bind(credit_note_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn insert_application(
    tx: &mut Transaction<'_, Postgres>,
    credit_note_id: Uuid,
    supplier_invoice_id: Uuid,
    amount_usd: Decimal,
    amount_lbp: Decimal,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO supplier_credit_applications (id, credit_note_id, supplier_invoice_id, amount_usd, amount_lbp)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(credit_note_id)
    .bind(supplier_invoice_id)
    .bind(amount_usd)
    .bind(amount_lbp)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn applications_for_credit_note(
    tx: &mut Transaction<'_, Postgres>,
    credit_note_id: Uuid,
) -> Result<Vec<SupplierCreditApplication>, sqlx::Error> {
    sqlx::query_as::<_, SupplierCreditApplication>(
        "SELECT id, credit_note_id, supplier_invoice_id, amount_usd, amount_lbp FROM supplier_credit_applications WHERE credit_note_id = $1",
    )
    .bind(credit_note_id)
    .fetch_all(&mut **tx)
    .await
}

/// Sum of every credit amount already applied to `invoice_id`, across all
/// credit notes — used to compute the invoice's remaining open balance.
pub async fn applied_total_for_invoice(
    tx: &mut Transaction<'_, Postgres>,
    invoice_id: Uuid,
) -> Result<(Decimal, Decimal), sqlx::Error> {
    let row: (Decimal, Decimal) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(amount_usd), 0), COALESCE(SUM(amount_lbp), 0)
        FROM supplier_credit_applications
        WHERE supplier_invoice_id = $1
        "#,
    )
    .bind(invoice_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

/// Sum of every amount already applied out of `credit_note_id` — used to
/// compute the credit note's remaining balance.
pub async fn applied_total_for_credit_note(
    tx: &mut Transaction<'_, Postgres>,
    credit_note_id: Uuid,
) -> Result<(Decimal, Decimal), sqlx::Error> {
    let row: (Decimal, Decimal) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(amount_usd), 0), COALESCE(SUM(amount_lbp), 0)
        FROM supplier_credit_applications
        WHERE credit_note_id = $1
        "#,
    )
    .bind(credit_note_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    // Query shape only; covered end-to-end against a live database. Pure
    // allocation/ratio logic lives in `services::supplier_credit::tests`.
}
