//! The error taxonomy every core component converts into at its boundary.
//!
//! Individual services define their own narrow `thiserror` enum (the way
//! `gl-rs`'s `JournalError`/`ReversalError`/`PeriodError` do) and implement
//! `From<TheirError> for CoreError` so callers outside the component see one
//! shape. `CoreError` itself carries no transport concerns (no status
//! codes) — translating it to 400/404/409/etc. is the external HTTP layer's
//! job, which is out of scope here per spec §1.

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("conflict: {message}")]
    Conflict {
        message: String,
        details: Option<Value>,
    },

    #[error("journal imbalanced: usd_diff={usd_diff} lbp_diff={lbp_diff}")]
    Imbalanced {
        usd_diff: String,
        lbp_diff: String,
    },

    #[error("sign mismatch between usd and lbp diffs")]
    SignMismatch,

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: String,
        requested: String,
        available: String,
    },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("upstream failure: {0}")]
    UpstreamFailure(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("audit write failed: {0}")]
    Audit(#[from] platform_audit::AuditError),

    #[error("numbering error: {0}")]
    Numbering(#[from] numbering::NumberingError),
}

impl CoreError {
    pub fn conflict(message: impl Into<String>, details: Option<Value>) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
