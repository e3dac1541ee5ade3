use std::env;

use anyhow::Context;
use chrono::FixedOffset;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub clinic_offset: FixedOffset,
    pub db_max_connections: u32,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);
        let offset_minutes = env::var("CLINIC_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
            .unwrap_or(0);
        let clinic_offset = FixedOffset::east_opt(offset_minutes * 60)
            .with_context(|| format!("CLINIC_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;
        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(10);
        let run_migrations = env::var("RUN_MIGRATIONS")
            .map(|s| !matches!(s.trim(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            clinic_offset,
            db_max_connections,
            run_migrations,
        })
    }
}
