//! Shared health and readiness check handlers for core services.

use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// Liveness payload. Cheap, never touches the database.
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

impl Health {
    pub fn ok(service: &'static str) -> Self {
        Self {
            status: "healthy",
            service,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Readiness payload. Carries the outcome of a DB round-trip so callers can
/// tell "process is up" apart from "process can actually serve tenants".
#[derive(Debug, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub database: &'static str,
    pub detail: Option<String>,
}

impl Readiness {
    pub fn ready() -> Self {
        Self {
            ready: true,
            database: "up",
            detail: None,
        }
    }

    pub fn not_ready(detail: impl Into<String>) -> Self {
        Self {
            ready: false,
            database: "down",
            detail: Some(detail.into()),
        }
    }
}

/// Axum handler for `GET /api/health`, shaped for a fixed service name.
pub async fn health_handler(service: &'static str) -> Json<Value> {
    Json(serde_json::to_value(Health::ok(service)).expect("Health always serializes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_ok_reports_version() {
        let h = Health::ok("erp-core");
        assert_eq!(h.status, "healthy");
        assert_eq!(h.service, "erp-core");
    }

    #[test]
    fn readiness_not_ready_carries_detail() {
        let r = Readiness::not_ready("connection refused");
        assert!(!r.ready);
        assert_eq!(r.detail.as_deref(), Some("connection refused"));
    }
}
