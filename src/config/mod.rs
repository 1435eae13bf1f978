//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. The database URL is wrapped in secrecy::SecretString so it
//! never lands in logs.

pub mod schedule;

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::time::Duration;

pub use schedule::{DrainSchedule, ScheduledDrain};

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Address the HTTP trigger surface binds to.
    pub bind_addr: String,
    /// Upper bound on a single HTTP-triggered drain.
    pub drain_timeout: Duration,
    /// pgmq visibility timeout for claimed units, in seconds. Never shorter
    /// than `drain_timeout`.
    pub visibility_timeout: i32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            drain_timeout: Duration::from_secs(parsed_var("DRAIN_TIMEOUT_SECS", 300)?),
            visibility_timeout: parsed_var(
                "VISIBILITY_TIMEOUT_SECS",
                crate::db::DEFAULT_VISIBILITY_TIMEOUT,
            )?,
        };
        config.check_drain_timeout("DRAIN_TIMEOUT_SECS", config.drain_timeout)?;
        Ok(config)
    }

    /// Reject a drain bound longer than the claim window.
    ///
    /// A failed unit is not retired, so once its claim lapses the same run
    /// could claim it again. Keeping every run inside the window rules
    /// that out.
    pub fn check_drain_timeout(&self, what: &str, timeout: Duration) -> Result<()> {
        check_claim_window(self.visibility_timeout, what, timeout)
    }
}

/// `timeout` must fit inside a claim of `visibility_timeout` seconds.
pub fn check_claim_window(visibility_timeout: i32, what: &str, timeout: Duration) -> Result<()> {
    let window = u64::try_from(visibility_timeout).unwrap_or(0);
    if window == 0 || Duration::from_secs(window) < timeout {
        return Err(Error::Config(format!(
            "{what} ({}s) exceeds VISIBILITY_TIMEOUT_SECS ({visibility_timeout}s)",
            timeout.as_secs()
        )));
    }
    Ok(())
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn parsed_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("{name}={raw:?} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}
