//! Application entry point for the `smartapt-alert-engine` daemon.
//!
//! This binary orchestrates the full startup sequence for the alert
//! evaluation pipeline, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the database schema if it does not exist
//! - Serving the `/health` ops endpoint
//! - Running the poll loop until a termination signal arrives
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DB_POOL_MAX` (optional) – maximum number of DB connections (default: 5)
//! - `LOOKBACK_WINDOW_SECS` (optional) – reading fetch window (default: 10)
//! - `POLL_INTERVAL_SECS` (optional) – inter-cycle sleep (default: 5)
//! - `STARTUP_DELAY_SECS` (optional) – delay before first cycle (default: 10)
//! - `FETCH_TIMEOUT_SECS` (optional) – per-cycle fetch bound (default: 15)
//! - `HTTP_PORT` (optional) – health endpoint port (default: 8080)
//! - `ENGINE_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `ENGINE_SPAN_EVENTS` (optional) – span event mode for tracing

use std::{env, io::IsTerminal, net::SocketAddr};

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod config;
mod engine;
mod feed;
mod ledger;
mod models;
mod routes;
mod rules;
mod schema;

pub use config::Config;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Attempting to connect to database: {}", cfg.db_url);

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database '{}': {}", cfg.db_url, e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    // Health endpoint runs beside the poll loop; it never blocks shutdown.
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port as u16));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Health endpoint listening on {}", addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, routes::router()).await {
            tracing::error!(error = %e, "Health endpoint server exited");
        }
    });

    // Ctrl-C / SIGTERM flips the shutdown channel; the poll loop's sleeps
    // select on it so termination is prompt even mid-interval.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Termination signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let poll_loop = engine::PollLoop::new(
        feed::PgReadingFeed::new(pool.clone()),
        ledger::PgAlertLedger::new(pool),
        &cfg,
    );
    poll_loop.run(shutdown_rx).await;

    tracing::info!("Alert engine stopped");
    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `ENGINE_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `ENGINE_LOG_LEVEL` env var
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked. It installs the subscriber globally
/// for the lifetime of the process.
fn init_tracing() {
    // ---
    let span_events = match env::var("ENGINE_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to ENGINE_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("ENGINE_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
