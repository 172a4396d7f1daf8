use crate::error::ConsolidationError;
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;

/// Process-level configuration, resolved once at startup and passed down.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub database_url: String,
    pub call_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConsolidationError> {
        dotenv().ok();

        let environment = env::var("APP_ENV")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        // DATABASE_URL_PRODUCTION, DATABASE_URL_STAGING, ... take precedence
        let scoped_key = format!("DATABASE_URL_{}", environment.to_ascii_uppercase());
        let database_url = env::var(&scoped_key)
            .or_else(|_| env::var("DATABASE_URL"))
            .map_err(|_| {
                ConsolidationError::Config(format!("{scoped_key} or DATABASE_URL missing"))
            })?;

        let call_timeout_secs = match env::var("CONSOLIDATE_CALL_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().ok().filter(|v| *v > 0).ok_or_else(|| {
                ConsolidationError::Config(format!(
                    "CONSOLIDATE_CALL_TIMEOUT_SECS must be a positive integer, got {raw:?}"
                ))
            })?,
            Err(_) => DEFAULT_CALL_TIMEOUT_SECS,
        };

        Ok(Self {
            environment,
            database_url,
            call_timeout_secs,
        })
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
