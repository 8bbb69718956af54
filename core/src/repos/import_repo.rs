//! Backs C10 (document attachments, supplier-invoice import staging lines).

use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::domain::import_pipeline::{DocumentAttachment, SupplierInvoiceImportLine};

pub async fn insert_attachment(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    entity_type: &str,
    entity_id: Uuid,
    storage_key: &str,
    size_bytes: i64,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO document_attachments (id, company_id, entity_type, entity_id, storage_key, size_bytes)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(entity_type)
    .bind(entity_id)
    .bind(storage_key)
    .bind(size_bytes)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn attachments_for_entity(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    entity_type: &str,
    entity_id: Uuid,
) -> Result<Vec<DocumentAttachment>, sqlx::Error> {
    sqlx::query_as::<_, DocumentAttachment>(
        r#"
        SELECT id, company_id, entity_type, entity_id, storage_key, size_bytes
        FROM document_attachments
        WHERE company_id = $1 AND entity_type = $2 AND entity_id = $3
        ORDER BY id
        "#,
    )
    .bind(company_id)
    .bind(entity_type)
    .bind(entity_id)
    .fetch_all(&mut **tx)
    .await
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_import_line(
    tx: &mut Transaction<'_, Postgres>,
    supplier_invoice_id: Uuid,
    supplier_item_code: Option<&str>,
    supplier_item_name: &str,
    qty: Decimal,
    unit_cost_usd: Decimal,
    unit_cost_lbp: Decimal,
    suggested_item_id: Option<Uuid>,
    suggested_confidence: Option<Decimal>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO supplier_invoice_import_lines
            (id, supplier_invoice_id, supplier_item_code, supplier_item_name, qty, unit_cost_usd, unit_cost_lbp,
             suggested_item_id, suggested_confidence, resolved_item_id, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, 'pending')
        "#,
    )
    .bind(id)
    .bind(supplier_invoice_id)
    .bind(supplier_item_code)
    .bind(supplier_item_name)
    .bind(qty)
    .bind(unit_cost_usd)
    .bind(unit_cost_lbp)
    .bind(suggested_item_id)
    .bind(suggested_confidence)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn import_lines_for_invoice(
    tx: &mut Transaction<'_, Postgres>,
    supplier_invoice_id: Uuid,
) -> Result<Vec<SupplierInvoiceImportLine>, sqlx::Error> {
    sqlx::query_as::<_, SupplierInvoiceImportLine>(
        r#"
        SELECT id, supplier_invoice_id, supplier_item_code, supplier_item_name, qty, unit_cost_usd, unit_cost_lbp,
               suggested_item_id, suggested_confidence, resolved_item_id, status
        FROM supplier_invoice_import_lines
        WHERE supplier_invoice_id = $1
        ORDER BY id
        "#,
    )
    .bind(supplier_invoice_id)
    .fetch_all(&mut **tx)
    .await
}

pub async fn find_import_line(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<SupplierInvoiceImportLine>, sqlx::Error> {
    sqlx::query_as::<_, SupplierInvoiceImportLine>(
        r#"
        SELECT id, supplier_invoice_id, supplier_item_code, supplier_item_name, qty, unit_cost_usd, unit_cost_lbp,
               suggested_item_id, suggested_confidence, resolved_item_id, status
        FROM supplier_invoice_import_lines
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await
}

pub async fn set_import_line_resolved(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    resolved_item_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_invoice_import_lines SET resolved_item_id = $2, status = 'resolved' WHERE id = $1")
        .bind(id)
        .bind(resolved_item_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn set_import_line_skipped(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE supplier_invoice_import_lines SET status = 'skipped' WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn any_line_pending(
    tx: &mut Transaction<'_, Postgres>,
    supplier_invoice_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM supplier_invoice_import_lines WHERE supplier_invoice_id = $1 AND status = 'pending'",
    )
    .bind(supplier_invoice_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count > 0)
}

pub async fn delete_import_lines_for_invoice(
    tx: &mut Transaction<'_, Postgres>,
    supplier_invoice_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM supplier_invoice_import_lines WHERE supplier_invoice_id = $1")
        .bind(supplier_invoice_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    // Query shape only — exercised end to end against a live database.
}
