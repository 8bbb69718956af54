//! Core entity shapes (spec.md §3), grouped by the component that owns
//! their lifecycle. These are plain data — no DB access lives here; that's
//! `repos::*`. No business logic either; that's `services::*`.

pub mod account;
pub mod ai;
pub mod batch;
pub mod company;
pub mod gl;
pub mod import_pipeline;
pub mod item;
pub mod purchasing;
pub mod scheduler;
pub mod supplier_credit;

pub use company::{Company, ExchangeRate, PeriodLock, RateType};
