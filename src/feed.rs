//! Reading feed: the poll loop's view of the shared sensor-reading store.
//!
//! The engine only consumes readings; the external sensor feed is the sole
//! writer. The trait seam exists so the poll loop can be exercised against
//! an in-memory feed in tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::Reading;

// ---

/// Query interface over the shared reading store.
#[async_trait]
pub trait ReadingFeed: Send + Sync {
    /// Fetch all readings observed at or after `cutoff`.
    async fn fetch_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reading>>;
}

/// PostgreSQL-backed reading feed over the `sensor_readings` table.
pub struct PgReadingFeed {
    // ---
    pool: PgPool,
}

impl PgReadingFeed {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReadingFeed for PgReadingFeed {
    async fn fetch_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reading>> {
        // ---
        let readings = sqlx::query_as::<_, Reading>(
            r#"
            SELECT id, apartment_id, room, sensor_type, value, observed_at
            FROM sensor_readings
            WHERE observed_at >= $1
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }
}
