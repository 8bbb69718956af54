//! POS & domain-event outbox drain (C12, outbox half).
//!
//! Grounded in `backend/workers/`'s poller shape and `gl-rs`'s
//! `consumer/gl_posting_consumer.rs`: claim a bounded batch `FOR UPDATE
//! SKIP LOCKED`, publish, finalize. Dead-lettering happens once `attempts`
//! reaches [`MAX_ATTEMPTS`].

use std::sync::Arc;

use event_bus::EventBus;
use sqlx::PgPool;

use crate::error::CoreResult;
use crate::repos::outbox_repo;

/// §4.12.a: fixed ceiling, configurable via `POS_OUTBOX_MAX_ATTEMPTS` in
/// the worker's environment rather than hardcoded at every call site.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;

/// One drain pass over the domain-event outbox (`purchase.ordered` etc.).
/// Returns the number of events successfully published.
pub async fn drain_domain_events(
    pool: &PgPool,
    bus: &Arc<dyn EventBus>,
    batch_size: i64,
    max_attempts: i32,
) -> CoreResult<u32> {
    let claimed = outbox_repo::claim_pending_events(pool, batch_size).await?;
    let mut published = 0;

    for event in claimed {
        let subject = format!("erp.events.{}", event.event_type);
        let payload = match serde_json::to_vec(&event.payload) {
            Ok(bytes) => bytes,
            Err(_) => {
                outbox_repo::mark_event_failed(pool, event.id, max_attempts).await?;
                continue;
            }
        };

        match bus.publish(&subject, payload).await {
            Ok(()) => {
                outbox_repo::mark_event_done(pool, event.id).await?;
                published += 1;
            }
            Err(err) => {
                tracing::warn!(event_id = %event.id, error = %err, "domain event publish failed");
                outbox_repo::mark_event_failed(pool, event.id, max_attempts).await?;
            }
        }
    }

    Ok(published)
}

/// One drain pass over the POS ingestion outbox.
pub async fn drain_pos_events(
    pool: &PgPool,
    bus: &Arc<dyn EventBus>,
    batch_size: i64,
    max_attempts: i32,
) -> CoreResult<u32> {
    let claimed = outbox_repo::claim_pending_pos_events(pool, batch_size).await?;
    let mut published = 0;

    for event in claimed {
        let subject = format!("erp.pos.{}", event.event_type);
        let payload = match serde_json::to_vec(&event.payload) {
            Ok(bytes) => bytes,
            Err(_) => {
                outbox_repo::mark_pos_event_failed(pool, event.id, max_attempts).await?;
                continue;
            }
        };

        match bus.publish(&subject, payload).await {
            Ok(()) => {
                outbox_repo::mark_pos_event_done(pool, event.id).await?;
                published += 1;
            }
            Err(err) => {
                tracing::warn!(event_id = %event.id, error = %err, "POS event publish failed");
                outbox_repo::mark_pos_event_failed(pool, event.id, max_attempts).await?;
            }
        }
    }

    Ok(published)
}
