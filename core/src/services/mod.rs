//! Business logic, one module per component. Each module keeps its pure
//! decision logic free of `sqlx` types so it can be unit tested directly;
//! orchestration functions thread a `Ctx` and an open transaction through
//! to the matching `repos::*` module.

pub mod account_defaults;
pub mod ai;
pub mod batch;
pub mod gl_posting;
pub mod import_pipeline;
pub mod inventory;
pub mod outbox;
pub mod period_lock;
pub mod purchasing;
pub mod scheduler;
pub mod supplier_credit;
pub mod uom;
