//! Manual test-reading injector.
//!
//! Inserts a single dangerously hot temperature reading into the shared
//! reading store so operators can verify the alert pipeline end to end:
//! run the engine, run `fire-drill`, and a high-temp alert should appear
//! in the ledger within one poll cycle.
//!
//! Requires `DATABASE_URL` (env or `.env`), same as the engine.

use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt().compact().init();
    dotenv().ok();

    let db_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in .env or environment"))?;

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&db_url)
        .await?;

    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO sensor_readings (id, apartment_id, room, sensor_type, value, observed_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind("A-101")
    .bind("Kitchen")
    .bind("temperature")
    .bind(serde_json::json!(90.0))
    .bind(Utc::now())
    .execute(&pool)
    .await?;

    tracing::info!(reading_id = %id, "Fire test reading inserted into sensor_readings");
    Ok(())
}
