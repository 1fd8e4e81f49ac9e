//! Database schema management for `weatherwatch`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` when a `DATABASE_URL` is set.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates `weather_readings` for normalized (Celsius) readings,
/// `temperature_alerts` for generated alerts and `user_thresholds` for the
/// per-city bounds. Safe to call on every startup; no-op if objects already
/// exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weather_readings (
            id                  BIGSERIAL PRIMARY KEY,
            city                TEXT             NOT NULL,
            temperature_celsius DOUBLE PRECISION NOT NULL,
            feels_like_celsius  DOUBLE PRECISION NOT NULL,
            condition           TEXT             NOT NULL,
            observed_at         BIGINT           NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS temperature_alerts (
            id          BIGSERIAL PRIMARY KEY,
            city        TEXT   NOT NULL,
            alert_type  TEXT   NOT NULL,
            message     TEXT   NOT NULL,
            observed_at BIGINT NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // One row per city; upserts rely on the primary key conflict.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_thresholds (
            city        TEXT PRIMARY KEY,
            min_celsius DOUBLE PRECISION NOT NULL,
            max_celsius DOUBLE PRECISION NOT NULL,
            CHECK (min_celsius <= max_celsius)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_weather_readings_city_time
            ON weather_readings (city, observed_at);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_temperature_alerts_city_time
            ON temperature_alerts (city, observed_at DESC);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!("Database schema ready");
    Ok(())
}
