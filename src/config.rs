use crate::engine::{ApprovalChain, SyncSettings};
use anyhow::{Context, anyhow};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_sync_per_min: u32,

    pub api_prefix: String,

    /// Tiers of the correction approval chain, level 1 first.
    pub approval_chain: ApprovalChain,
    pub sync_concurrency: usize,
    pub sync_item_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{} must be set", key));

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,

            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,
            rate_sync_per_min: parse_or(&lookup, "RATE_SYNC_PER_MIN", 10)?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api/v1".to_string()),

            approval_chain: match lookup("APPROVAL_CHAIN") {
                Some(raw) => ApprovalChain::from_str(&raw)
                    .map_err(|e| anyhow!(e))
                    .context("APPROVAL_CHAIN is invalid")?,
                None => ApprovalChain::default(),
            },
            sync_concurrency: parse_or(&lookup, "SYNC_CONCURRENCY", 8)?,
            sync_item_timeout_ms: parse_or(&lookup, "SYNC_ITEM_TIMEOUT_MS", 10_000)?,
        })
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            concurrency: self.sync_concurrency.max(1),
            item_timeout: Duration::from_millis(self.sync_item_timeout_ms),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
