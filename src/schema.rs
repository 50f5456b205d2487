//! Database schema management for `smartapt-alert-engine`.
//!
//! Ensures required tables and indexes exist before the poll loop starts.
//! Applied once on startup from `main.rs`.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the `sensor_readings` table consumed by the poll loop and the
/// `alerts` ledger it writes into. The UNIQUE index on
/// `(source_reading_id, kind)` is what makes reconciliation idempotent at
/// the store level. Safe to call on every startup; no-op if objects
/// already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Shared reading store; written by the external sensor feed, read here.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id           UUID        PRIMARY KEY DEFAULT gen_random_uuid(),
            apartment_id TEXT        NOT NULL,
            room         TEXT,
            sensor_type  TEXT        NOT NULL,
            value        JSONB       NOT NULL,
            observed_at  TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Alert ledger; status transitions belong to the admin dashboard.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id                UUID        PRIMARY KEY,
            apartment_id      TEXT        NOT NULL,
            room              TEXT        NOT NULL,
            source_reading_id UUID        NOT NULL,
            kind              TEXT        NOT NULL,
            severity          TEXT        NOT NULL,
            message           TEXT        NOT NULL,
            status            TEXT        NOT NULL DEFAULT 'new',
            created_at        TIMESTAMPTZ NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Dedup key: at most one alert per (source reading, kind).
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_dedup_key
            ON alerts (source_reading_id, kind);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Windowed fetch runs every cycle
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_observed_at
            ON sensor_readings (observed_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Dashboard lookup pattern from the original store
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_sensor_readings_apartment
            ON sensor_readings (apartment_id, room, sensor_type, observed_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Admin dashboard filters alerts by status and recency
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_alerts_status_created_at
            ON alerts (status, created_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
