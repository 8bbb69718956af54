//! Backs the transactional outbox for domain events (`purchase.ordered`,
//! `purchase.received`, `purchase.invoiced`) and the POS ingestion outbox.
//! Domain events are appended in the same transaction as the posting that
//! produced them; draining and publishing to the event bus happens later,
//! out of band, in `services::outbox`.

use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::scheduler::PosEventsOutbox;

pub async fn append_domain_event(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    event_type: &str,
    payload: Value,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO events (id, company_id, event_type, payload, status, created_at)
        VALUES ($1, $2, $3, $4, 'pending', NOW())
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(event_type)
    .bind(payload)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DomainEventRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub attempts: i32,
}

/// Claims up to `limit` pending domain events, locking them so concurrent
/// drain workers don't double-publish.
pub async fn claim_pending_events(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<DomainEventRow>, sqlx::Error> {
    sqlx::query_as::<_, DomainEventRow>(
        r#"
        UPDATE events
        SET status = 'processing'
        WHERE id IN (
            SELECT id FROM events WHERE status = 'pending' ORDER BY created_at LIMIT $1 FOR UPDATE SKIP LOCKED
        )
        RETURNING id, company_id, event_type, payload, attempts
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn mark_event_done(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE events SET status = 'done' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_event_failed(pool: &PgPool, id: Uuid, max_attempts: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE events
        SET attempts = attempts + 1,
            status = CASE WHEN attempts + 1 >= $2 THEN 'dead' ELSE 'failed' END
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(max_attempts)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn append_pos_event(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    device_id: &str,
    event_type: &str,
    payload: Value,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO pos_events_outbox (id, company_id, device_id, event_type, payload, status, attempts)
        VALUES ($1, $2, $3, $4, $5, 'pending', 0)
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(device_id)
    .bind(event_type)
    .bind(payload)
    .execute(&mut **tx)
    .await?;
    Ok(id)
}

pub async fn claim_pending_pos_events(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<PosEventsOutbox>, sqlx::Error> {
    sqlx::query_as::<_, PosEventsOutbox>(
        r#"
        UPDATE pos_events_outbox
        SET status = 'processing'
        WHERE id IN (
            SELECT id FROM pos_events_outbox WHERE status = 'pending' ORDER BY id LIMIT $1 FOR UPDATE SKIP LOCKED
        )
        RETURNING id, company_id, device_id, event_type, payload, status, attempts
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn mark_pos_event_done(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE pos_events_outbox SET status = 'done' WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_pos_event_failed(
    pool: &PgPool,
    id: Uuid,
    max_attempts: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE pos_events_outbox
        SET attempts = attempts + 1,
            status = CASE WHEN attempts + 1 >= $2 THEN 'dead' ELSE 'failed' END
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(max_attempts)
    .execute(pool)
    .await?;
    Ok(())
}
