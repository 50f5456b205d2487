//! Configuration loader for the `smartapt-alert-engine` daemon.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller). Configuration errors are fatal at
//! startup: the engine fails fast rather than run with ambiguous polling
//! settings.

use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the daemon.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string for the shared reading/alert store.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Lookback window in seconds for each poll cycle's reading fetch.
    pub lookback_window_secs: u32,

    /// Sleep between poll cycles, in seconds.
    pub poll_interval_secs: u32,

    /// One-time delay before the first fetch after startup, in seconds.
    pub startup_delay_secs: u32,

    /// Upper bound on a single cycle's reading fetch, in seconds.
    pub fetch_timeout_secs: u32,

    /// Port for the `/health` endpoint.
    pub http_port: u32,
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `LOOKBACK_WINDOW_SECS` – reading fetch window (default: 10)
/// - `POLL_INTERVAL_SECS` – inter-cycle sleep (default: 5)
/// - `STARTUP_DELAY_SECS` – delay before the first cycle (default: 10)
/// - `FETCH_TIMEOUT_SECS` – per-cycle fetch bound (default: 15)
/// - `HTTP_PORT` – health endpoint port (default: 8080)
///
/// Returns an error if any required variable is missing, any value fails
/// to parse, or the lookback window does not exceed the poll interval
/// (adjacent cycles must overlap or readings can be skipped).
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let lookback_window_secs = parse_env_u32!("LOOKBACK_WINDOW_SECS", 10);
    let poll_interval_secs = parse_env_u32!("POLL_INTERVAL_SECS", 5);
    let startup_delay_secs = parse_env_u32!("STARTUP_DELAY_SECS", 10);
    let fetch_timeout_secs = parse_env_u32!("FETCH_TIMEOUT_SECS", 15);
    let http_port = parse_env_u32!("HTTP_PORT", 8080);

    if lookback_window_secs <= poll_interval_secs {
        return Err(anyhow!(
            "LOOKBACK_WINDOW_SECS ({}) must exceed POLL_INTERVAL_SECS ({}) \
             so adjacent poll windows overlap",
            lookback_window_secs,
            poll_interval_secs
        ));
    }

    Ok(Config {
        db_url,
        db_pool_max,
        lookback_window_secs,
        poll_interval_secs,
        startup_delay_secs,
        fetch_timeout_secs,
        http_port,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords while showing
    /// all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        // Mask the password in the database URL for security
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL         : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX          : {}", self.db_pool_max);
        tracing::info!("  LOOKBACK_WINDOW_SECS : {}", self.lookback_window_secs);
        tracing::info!("  POLL_INTERVAL_SECS   : {}", self.poll_interval_secs);
        tracing::info!("  STARTUP_DELAY_SECS   : {}", self.startup_delay_secs);
        tracing::info!("  FETCH_TIMEOUT_SECS   : {}", self.fetch_timeout_secs);
        tracing::info!("  HTTP_PORT            : {}", self.http_port);
    }
}
