//! Alert ledger: deduplicated persistence of classified incidents.
//!
//! Deduplication is keyed on the immutable `(source_reading_id, kind)` pair
//! rather than a time-window heuristic on apartment+room+type. Reprocessing
//! the same reading — including overlapping poll windows — is therefore a
//! no-op, regardless of clock skew or poll-interval changes. The ledger is
//! shared with the admin dashboard, which owns status transitions; the
//! engine only ever inserts `status = 'new'` rows.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{AlertKind, AlertStatus, NewAlert};

// ---

/// Dedup store adapter over the alert ledger.
#[async_trait]
pub trait AlertLedger: Send + Sync {
    /// True if an alert already exists for the exact `(source_reading_id,
    /// kind)` pair, regardless of its current status.
    async fn alert_exists(&self, source_reading_id: Uuid, kind: AlertKind) -> Result<bool>;

    /// Persist a new alert with `status = new`.
    ///
    /// Returns `false` when the store-level uniqueness constraint swallowed
    /// a concurrent duplicate insert for the same dedup key; that outcome
    /// is benign and must not be treated as an error.
    async fn insert_alert(&self, alert: &NewAlert) -> Result<bool>;
}

/// PostgreSQL-backed alert ledger over the `alerts` table.
///
/// The table carries a UNIQUE index on `(source_reading_id, kind)`, so the
/// check-then-insert sequence stays safe even if a second engine instance
/// ever runs concurrently.
pub struct PgAlertLedger {
    // ---
    pool: PgPool,
}

impl PgAlertLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertLedger for PgAlertLedger {
    async fn alert_exists(&self, source_reading_id: Uuid, kind: AlertKind) -> Result<bool> {
        // ---
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM alerts
                WHERE source_reading_id = $1 AND kind = $2
            )
            "#,
        )
        .bind(source_reading_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_alert(&self, alert: &NewAlert) -> Result<bool> {
        // ---
        let result = sqlx::query(
            r#"
            INSERT INTO alerts (
                id, apartment_id, room, source_reading_id,
                kind, severity, message, status, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_reading_id, kind) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&alert.apartment_id)
        .bind(&alert.room)
        .bind(alert.source_reading_id)
        .bind(alert.kind.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(AlertStatus::New.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
