use std::net::IpAddr;

use crate::idempotency::IdempotencyPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without it submissions are kept in memory.
    pub database_url: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    pub log_level: String,
    pub idempotency_policy: IdempotencyPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let host: IpAddr = env_or("OBSIM_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid OBSIM_HOST: {e}"))?;

        let port: u16 = env_or("OBSIM_PORT", "8080")
            .parse()
            .map_err(|e| format!("Invalid OBSIM_PORT: {e}"))?;

        let base_url = env_or("OBSIM_BASE_URL", &format!("http://{host}:{port}"));

        let log_level = env_or("OBSIM_LOG_LEVEL", "info");

        let policy = env_or("OBSIM_IDEMPOTENCY_POLICY", "key-and-payload");
        let idempotency_policy = IdempotencyPolicy::parse(&policy).ok_or_else(|| {
            format!("Invalid OBSIM_IDEMPOTENCY_POLICY '{policy}': expected key-and-payload or key-only")
        })?;

        Ok(Config {
            database_url,
            host,
            port,
            base_url,
            log_level,
            idempotency_policy,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
