use sqlx::{PgPool, Row};

use super::{AlertStore, ReadingStore, Store, ThresholdStore};
use crate::error::Result;
use crate::models::{Alert, AlertType, Reading, Threshold};

// ---

/// PostgreSQL backend. Tables are created by [`crate::schema::create_schema`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReadingRow {
    city: String,
    temperature_celsius: f64,
    feels_like_celsius: f64,
    condition: String,
    observed_at: i64,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Reading {
            city: row.city,
            temperature_celsius: row.temperature_celsius,
            feels_like_celsius: row.feels_like_celsius,
            condition: row.condition,
            observed_at: row.observed_at,
        }
    }
}

impl ReadingStore for PgStore {
    // ---
    async fn append_reading(&self, reading: &Reading) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO weather_readings (
                city, temperature_celsius, feels_like_celsius, condition, observed_at
            ) VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&reading.city)
        .bind(reading.temperature_celsius)
        .bind(reading.feels_like_celsius)
        .bind(&reading.condition)
        .bind(reading.observed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn readings_between(&self, city: &str, from: i64, to: i64) -> Result<Vec<Reading>> {
        // ---
        let rows: Vec<ReadingRow> = sqlx::query_as(
            r#"
            SELECT city, temperature_celsius, feels_like_celsius, condition, observed_at
            FROM weather_readings
            WHERE city = $1 AND observed_at >= $2 AND observed_at < $3
            ORDER BY observed_at ASC, id ASC
            "#,
        )
        .bind(city)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Reading::from).collect())
    }
}

impl ThresholdStore for PgStore {
    // ---
    async fn upsert_threshold(&self, threshold: &Threshold) -> Result<()> {
        // ---
        threshold.validate()?;
        sqlx::query(
            r#"
            INSERT INTO user_thresholds (city, min_celsius, max_celsius)
            VALUES ($1, $2, $3)
            ON CONFLICT (city) DO UPDATE SET
                min_celsius = EXCLUDED.min_celsius,
                max_celsius = EXCLUDED.max_celsius
            "#,
        )
        .bind(&threshold.city)
        .bind(threshold.min_celsius)
        .bind(threshold.max_celsius)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn threshold(&self, city: &str) -> Result<Option<Threshold>> {
        // ---
        let row = sqlx::query(
            "SELECT city, min_celsius, max_celsius FROM user_thresholds WHERE city = $1",
        )
        .bind(city)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<Threshold> {
            Ok(Threshold {
                city: r.try_get("city")?,
                min_celsius: r.try_get("min_celsius")?,
                max_celsius: r.try_get("max_celsius")?,
            })
        })
        .transpose()
    }
}

impl AlertStore for PgStore {
    // ---
    async fn append_alert(&self, alert: &Alert) -> Result<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO temperature_alerts (city, alert_type, message, observed_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&alert.city)
        .bind(alert.alert_type.as_str())
        .bind(&alert.message)
        .bind(alert.observed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn alerts_since(&self, city: &str, since: i64, limit: usize) -> Result<Vec<Alert>> {
        // ---
        let rows = sqlx::query(
            r#"
            SELECT city, alert_type, message, observed_at
            FROM temperature_alerts
            WHERE city = $1 AND observed_at >= $2
            ORDER BY observed_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(city)
        .bind(since)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<Alert> {
                let kind: String = r.try_get("alert_type")?;
                Ok(Alert {
                    city: r.try_get("city")?,
                    alert_type: kind.parse::<AlertType>()?,
                    message: r.try_get("message")?,
                    observed_at: r.try_get("observed_at")?,
                })
            })
            .collect()
    }
}

impl Store for PgStore {
    // ---
    async fn clear_all(&self) -> Result<()> {
        // ---
        sqlx::query("TRUNCATE weather_readings, temperature_alerts, user_thresholds")
            .execute(&self.pool)
            .await?;
        tracing::info!("Database tables truncated");
        Ok(())
    }
}
