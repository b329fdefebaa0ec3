use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Passwords for the default accounts created by `seed`. Unset means skip.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    pub admin_password: Option<String>,
    pub support_password: Option<String>,
    pub info_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub seed: SeedConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "gearup-users".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "gearup-clients".into()),
            ttl_minutes: checked_ttl_minutes(env_parse("JWT_TTL_MINUTES", 30)?)?,
        };
        let seed = SeedConfig {
            admin_password: std::env::var("SEED_ADMIN_PASSWORD").ok(),
            support_password: std::env::var("SEED_SUPPORT_PASSWORD").ok(),
            info_password: std::env::var("SEED_INFO_PASSWORD").ok(),
        };
        Ok(Self {
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", 10)?,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT", 8080)?,
            jwt,
            seed,
        })
    }
}

/// Longest token lifetime accepted from configuration (30 days).
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 30;

fn checked_ttl_minutes(minutes: i64) -> anyhow::Result<i64> {
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {minutes}"
    );
    Ok(minutes)
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v.parse::<T>().with_context(|| format!("invalid value for {key}: {v:?}")),
        Err(_) => Ok(default),
    }
}
