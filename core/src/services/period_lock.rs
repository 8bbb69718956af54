//! Tenant Context & Period Locks (C2).

use chrono::NaiveDate;
use sqlx::{Postgres, Transaction};

use crate::context::Ctx;
use crate::error::{CoreError, CoreResult};
use crate::repos::account_repo;

/// Fails the operation when any period lock covers `date` with
/// `locked = true`. Every GL-emitting path calls this with the effective
/// posting date before writing anything (spec.md §4.2).
pub async fn assert_period_open(
    ctx: &Ctx,
    tx: &mut Transaction<'_, Postgres>,
    date: NaiveDate,
) -> CoreResult<()> {
    if let Some(lock) = account_repo::find_lock_covering(tx, ctx.company_id, date).await? {
        return Err(CoreError::Precondition(format!(
            "accounting period is locked for date {date} (lock {} .. {})",
            lock.start_date, lock.end_date
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    // `assert_period_open` is a thin DB guard; its branching logic is
    // exercised by the repo query itself. Pure-logic coverage for period
    // gating lives in `gl_posting::tests` where posting paths call it.
}
