//! Application configuration parsed from environment variables.
//!
//! Mirrors `gl-rs::config::Config::from_env` — one `env::var` per setting,
//! `unwrap_or_else` for anything with a safe default, a hard error only for
//! `DATABASE_URL`.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    pub database_url: String,
    pub cors_origins: Vec<String>,
    pub downloads_hosts: Vec<String>,
    pub app_version: String,
    pub attachment_max_mb: u64,
    pub host: String,
    pub port: u16,
    pub bus_type: String,
    pub nats_url: String,
    pub worker_poll_interval_secs: u64,
    pub outbox_batch_size: i64,
    pub outbox_max_attempts: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Local,
    Dev,
    Staging,
    Prod,
}

impl AppEnv {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "prod" | "production" => AppEnv::Prod,
            "staging" => AppEnv::Staging,
            "dev" => AppEnv::Dev,
            _ => AppEnv::Local,
        }
    }

    /// Dev-only endpoints (demo-data seeding) are gated on this.
    pub fn allows_dev_endpoints(&self) -> bool {
        matches!(self, AppEnv::Local | AppEnv::Dev)
    }
}

fn split_csv(raw: &str, default: &[&str]) -> Vec<String> {
    let parts: Vec<String> = raw
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        parts
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let app_env = AppEnv::parse(&env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()));

        let cors_origins = split_csv(
            &env::var("CORS_ORIGINS").unwrap_or_default(),
            &["http://localhost:3000", "http://127.0.0.1:3000"],
        );

        let downloads_hosts = split_csv(
            &env::var("DOWNLOADS_HOSTS").unwrap_or_default(),
            &["download.melqard.com"],
        );

        let app_version = {
            let v = env::var("APP_VERSION").unwrap_or_default();
            let v = v.trim();
            if v.is_empty() {
                "0.1.0".to_string()
            } else {
                v.to_string()
            }
        };

        let attachment_max_mb: u64 = env::var("ATTACHMENT_MAX_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8090".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let bus_type = env::var("BUS_TYPE").unwrap_or_else(|_| "inmemory".to_string());
        let nats_url = env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let worker_poll_interval_secs: u64 = env::var("WORKER_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let outbox_batch_size: i64 = env::var("OUTBOX_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        let outbox_max_attempts: i32 = env::var("OUTBOX_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::services::outbox::DEFAULT_MAX_ATTEMPTS);

        Ok(Config {
            app_env,
            database_url,
            cors_origins,
            downloads_hosts,
            app_version,
            attachment_max_mb,
            host,
            port,
            bus_type,
            nats_url,
            worker_poll_interval_secs,
            outbox_batch_size,
            outbox_max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_falls_back_to_default_when_blank() {
        let got = split_csv("", &["a", "b"]);
        assert_eq!(got, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn split_csv_trims_and_drops_empties() {
        let got = split_csv(" a ,, b,c ", &["x"]);
        assert_eq!(got, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn app_env_defaults_to_local_on_unknown() {
        assert_eq!(AppEnv::parse("nonsense"), AppEnv::Local);
    }

    #[test]
    fn only_local_and_dev_allow_dev_endpoints() {
        assert!(AppEnv::Local.allows_dev_endpoints());
        assert!(AppEnv::Dev.allows_dev_endpoints());
        assert!(!AppEnv::Staging.allows_dev_endpoints());
        assert!(!AppEnv::Prod.allows_dev_endpoints());
    }
}
