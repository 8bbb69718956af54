//! Supplier-Invoice Import Pipeline (C10).
//!
//! Grounded in `services::purchasing`'s status-machine shape for the
//! upload/extract/review/apply lifecycle, and in `services::batch`'s
//! pure-function style for the normalization/matching helpers, which are
//! unit tested without a database. The [`ExtractionProvider`] seam keeps
//! the actual OCR/LLM call pluggable; [`MockExtractionProvider`] is the
//! deterministic stand-in used outside of a configured extraction backend.

use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::context::Ctx;
use crate::domain::import_pipeline::ExtractedLine;
use crate::error::{CoreError, CoreResult};
use crate::repos::{import_repo, item_repo, purchasing_repo};

/// Attachments over this size are rejected at upload time rather than
/// accepted and failed later during extraction.
pub const MAX_ATTACHMENT_BYTES: i64 = 20 * 1024 * 1024;

/// Pulls structured line items out of a raw document. Implementations may
/// call out to an OCR/LLM service; the trait itself has no I/O
/// requirements beyond returning the extracted lines.
pub trait ExtractionProvider {
    async fn extract(&self, document_bytes: &[u8]) -> CoreResult<Vec<ExtractedLine>>;
}

/// Parses a simple `code|name|qty|unit_cost_usd|unit_cost_lbp` pipe-
/// delimited text format. Used in place of a real extraction backend in
/// development and in tests: deterministic, no network call, and the
/// content hash it logs lets callers confirm two uploads were byte-
/// identical without diffing the whole document.
#[derive(Debug, Default)]
pub struct MockExtractionProvider;

impl ExtractionProvider for MockExtractionProvider {
    async fn extract(&self, document_bytes: &[u8]) -> CoreResult<Vec<ExtractedLine>> {
        let digest = Sha256::digest(document_bytes);
        tracing::debug!(content_sha256 = %hex_digest(&digest), "mock extraction running");

        let text = std::str::from_utf8(document_bytes)
            .map_err(|_| CoreError::Validation("document is not valid UTF-8 text".to_string()))?;

        let mut lines = Vec::new();
        for (line_no, raw) in text.lines().enumerate() {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let fields: Vec<&str> = raw.split('|').collect();
            if fields.len() != 5 {
                return Err(CoreError::Validation(format!(
                    "line {}: expected 5 pipe-delimited fields, found {}",
                    line_no + 1,
                    fields.len()
                )));
            }
            let qty: Decimal = fields[2]
                .parse()
                .map_err(|_| CoreError::Validation(format!("line {}: invalid qty", line_no + 1)))?;
            let unit_cost_usd: Decimal = fields[3]
                .parse()
                .map_err(|_| CoreError::Validation(format!("line {}: invalid unit_cost_usd", line_no + 1)))?;
            let unit_cost_lbp: Decimal = fields[4]
                .parse()
                .map_err(|_| CoreError::Validation(format!("line {}: invalid unit_cost_lbp", line_no + 1)))?;

            lines.push(ExtractedLine {
                supplier_item_code: non_empty(fields[0]),
                supplier_item_name: non_empty(fields[1]),
                qty,
                unit_cost_usd,
                unit_cost_lbp,
            });
        }
        Ok(lines)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Normalizes a supplier-provided code or name for alias/SKU matching:
/// lowercased, internal whitespace collapsed, leading/trailing trimmed.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Creates a draft supplier invoice and attaches the uploaded document.
/// `skip_extract` leaves the invoice at `pending` for a human to fill in
/// manually (or a later call to [`process_extraction`]); when false the
/// caller is expected to invoke [`process_extraction`] in the same
/// request (`sync`) or hand the invoice off to a background worker.
#[allow(clippy::too_many_arguments)]
pub async fn create_draft_invoice_for_import(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    supplier_id: Uuid,
    exchange_rate: Decimal,
    invoice_date: chrono::NaiveDate,
    storage_key: &str,
    size_bytes: i64,
    skip_extract: bool,
) -> CoreResult<Uuid> {
    if size_bytes > MAX_ATTACHMENT_BYTES {
        return Err(CoreError::Validation(format!(
            "attachment of {size_bytes} bytes exceeds the {MAX_ATTACHMENT_BYTES}-byte limit"
        )));
    }

    let si_id =
        purchasing_repo::insert_draft_invoice_for_import(tx, ctx.company_id, supplier_id, exchange_rate, invoice_date)
            .await?;

    import_repo::insert_attachment(tx, ctx.company_id, "supplier_invoice", si_id, storage_key, size_bytes).await?;

    if skip_extract {
        purchasing_repo::set_si_import_status(tx, si_id, "skipped").await?;
    }

    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "purchasing.supplier_invoice.import_upload",
        "supplier_invoice",
        &si_id.to_string(),
        serde_json::json!({ "storage_key": storage_key, "size_bytes": size_bytes, "skip_extract": skip_extract }),
    )
    .await?;

    Ok(si_id)
}

/// Runs extraction against the invoice's uploaded document and stages one
/// import line per extracted line, each fuzzy-matched against the
/// supplier's known items: an exact alias match first, falling back to a
/// normalized-SKU match, leaving the line unmatched otherwise.
pub async fn process_extraction(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    si_id: Uuid,
    provider: &impl ExtractionProvider,
    document_bytes: &[u8],
) -> CoreResult<usize> {
    let si = purchasing_repo::find_si(tx, ctx.company_id, si_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("supplier invoice not found".to_string()))?;

    if si.import_status != "pending" {
        return Err(CoreError::Precondition(
            "extraction can only run on an invoice pending import".to_string(),
        ));
    }

    purchasing_repo::set_si_import_status(tx, si_id, "processing").await?;

    let extracted = match provider.extract(document_bytes).await {
        Ok(lines) => lines,
        Err(err) => {
            purchasing_repo::set_si_import_status(tx, si_id, "failed").await?;
            return Err(err);
        }
    };

    if extracted.is_empty() {
        purchasing_repo::set_si_import_status(tx, si_id, "failed").await?;
        return Err(CoreError::Validation(
            "extraction produced no line items".to_string(),
        ));
    }

    for line in &extracted {
        let normalized_code = line.supplier_item_code.as_deref().map(normalize);
        let normalized_name = line.supplier_item_name.as_deref().map(normalize);

        let (suggested_item_id, suggested_confidence) = match_supplier_line(
            tx,
            ctx.company_id,
            si.supplier_id,
            normalized_code.as_deref(),
            normalized_name.as_deref(),
        )
        .await?;

        import_repo::insert_import_line(
            tx,
            si_id,
            line.supplier_item_code.as_deref(),
            line.supplier_item_name.as_deref().unwrap_or(""),
            line.qty,
            line.unit_cost_usd,
            line.unit_cost_lbp,
            suggested_item_id,
            suggested_confidence,
        )
        .await?;
    }

    purchasing_repo::set_si_import_status(tx, si_id, "pending_review").await?;

    Ok(extracted.len())
}

/// `(item_id, confidence)` for a supplier line, or `(None, None)` when no
/// match is found. An exact alias match (the supplier's own code/name
/// previously confirmed by a human) is trusted fully; a normalized-SKU
/// coincidence is surfaced but flagged with a lower confidence since it
/// hasn't been confirmed for this supplier before.
async fn match_supplier_line(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    company_id: Uuid,
    supplier_id: Uuid,
    normalized_code: Option<&str>,
    normalized_name: Option<&str>,
) -> CoreResult<(Option<Uuid>, Option<Decimal>)> {
    use rust_decimal_macros::dec;

    if let Some(alias) = item_repo::find_alias_match(tx, company_id, supplier_id, normalized_code, normalized_name).await? {
        return Ok((Some(alias.item_id), Some(dec!(1.0))));
    }

    if let Some(code) = normalized_code {
        if let Some(item) = item_repo::find_item_by_normalized_sku(tx, company_id, code).await? {
            return Ok((Some(item.id), Some(dec!(0.7))));
        }
    }

    Ok((None, None))
}

/// Resolves one pending import line to a specific item, confirming (or
/// overriding) the suggested match.
pub async fn resolve_import_line(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    line_id: Uuid,
    item_id: Uuid,
) -> CoreResult<()> {
    import_repo::find_import_line(tx, line_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("import line not found".to_string()))?;
    import_repo::set_import_line_resolved(tx, line_id, item_id).await?;
    Ok(())
}

/// Skips an import line — it was a duplicate, a non-inventory charge, or
/// otherwise shouldn't become an invoice line.
pub async fn skip_import_line(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, line_id: Uuid) -> CoreResult<()> {
    import_repo::find_import_line(tx, line_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("import line not found".to_string()))?;
    import_repo::set_import_line_skipped(tx, line_id).await?;
    Ok(())
}

/// Confirms every staged line has been resolved or skipped, moving the
/// invoice from `pending_review` to `reviewed` — the precondition
/// [`apply_import`] checks before materializing invoice lines.
pub async fn mark_import_reviewed(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    si_id: Uuid,
) -> CoreResult<()> {
    let si = purchasing_repo::find_si(tx, ctx.company_id, si_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("supplier invoice not found".to_string()))?;

    if si.import_status != "pending_review" {
        return Err(CoreError::Precondition(
            "invoice is not pending import review".to_string(),
        ));
    }
    if import_repo::any_line_pending(tx, si_id).await? {
        return Err(CoreError::Precondition(
            "every import line must be resolved or skipped first".to_string(),
        ));
    }

    purchasing_repo::set_si_import_status(tx, si_id, "reviewed").await?;
    Ok(())
}

/// Materializes every resolved import line as a real invoice line,
/// replacing whatever lines the invoice already had (so a correction pass
/// — unresolve, re-review, re-apply — stays idempotent), then learns the
/// supplier's cost and item alias from each resolved line for next time.
pub async fn apply_import(
    ctx: &Ctx,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    si_id: Uuid,
) -> CoreResult<usize> {
    let si = purchasing_repo::find_si(tx, ctx.company_id, si_id)
        .await?
        .ok_or_else(|| CoreError::NotFound("supplier invoice not found".to_string()))?;

    if si.import_status != "reviewed" {
        return Err(CoreError::Precondition(
            "invoice has not completed import review".to_string(),
        ));
    }

    let lines = import_repo::import_lines_for_invoice(tx, si_id).await?;
    purchasing_repo::delete_si_lines(tx, si_id).await?;

    let mut applied = 0;
    for line in &lines {
        if line.status == "skipped" {
            continue;
        }
        let item_id = line
            .resolved_item_id
            .ok_or_else(|| CoreError::Precondition("a non-skipped import line has no resolved item".to_string()))?;

        purchasing_repo::insert_si_line(tx, si_id, None, item_id, line.qty, line.unit_cost_usd, line.unit_cost_lbp)
            .await?;

        item_repo::upsert_item_supplier_cost(tx, item_id, si.supplier_id, line.unit_cost_usd, line.unit_cost_lbp).await?;

        let normalized_code = line.supplier_item_code.as_deref().map(normalize);
        let normalized_name = line.supplier_item_name.as_deref().map(normalize);
        if normalized_code.is_some() || normalized_name.is_some() {
            item_repo::upsert_supplier_item_alias(
                tx,
                ctx.company_id,
                si.supplier_id,
                normalized_code.as_deref(),
                normalized_name.as_deref(),
                item_id,
            )
            .await?;
        }

        applied += 1;
    }

    purchasing_repo::set_si_import_status(tx, si_id, "filled").await?;

    platform_audit::record(
        tx,
        ctx.company_id,
        ctx.user_id,
        "purchasing.supplier_invoice.import_apply",
        "supplier_invoice",
        &si_id.to_string(),
        serde_json::json!({ "lines_applied": applied }),
    )
    .await?;

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize("  ACME   Widget  "), "acme widget");
        assert_eq!(normalize("acme widget"), "acme widget");
    }

    #[tokio::test]
    async fn mock_provider_parses_pipe_delimited_lines() {
        let provider = MockExtractionProvider;
        let doc = b"SKU-1|Widget A|10|2.50|224000\nSKU-2|Widget B|5|1.00|89500\n";
        let lines = provider.extract(doc).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].supplier_item_code.as_deref(), Some("SKU-1"));
        assert_eq!(lines[0].qty, Decimal::new(10, 0));
    }

    #[tokio::test]
    async fn mock_provider_rejects_malformed_lines() {
        let provider = MockExtractionProvider;
        let doc = b"SKU-1|Widget A|10\n";
        assert!(provider.extract(doc).await.is_err());
    }

    #[tokio::test]
    async fn mock_provider_skips_blank_lines() {
        let provider = MockExtractionProvider;
        let doc = b"SKU-1|Widget A|10|2.50|224000\n\n\n";
        let lines = provider.extract(doc).await.unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn non_empty_treats_whitespace_only_as_absent() {
        assert_eq!(non_empty("   "), None);
        assert_eq!(non_empty(" x "), Some("x".to_string()));
    }
}
