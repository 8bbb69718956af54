//! Dual-currency posting engine, purchasing 3-way-match, batch-tracked
//! inventory costing, and AI decision pipeline for the retail ERP core.
//!
//! This crate is a library of domain types, repositories, and services; the
//! HTTP routing and worker loop live in `src/main.rs` and `src/bin/worker.rs`
//! respectively and are intentionally thin.

pub mod config;
pub mod context;
pub mod db;
pub mod domain;
pub mod error;
pub mod money;
pub mod repos;
pub mod services;
