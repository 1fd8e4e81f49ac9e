use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{AlertStore, ReadingStore, Store, ThresholdStore};
use crate::error::Result;
use crate::models::{Alert, Reading, Threshold};

// ---

#[derive(Debug, Default)]
struct Tables {
    readings: HashMap<String, Vec<Reading>>,
    thresholds: HashMap<String, Threshold>,
    alerts: HashMap<String, Vec<Alert>>,
}

/// Process-local store used when no `DATABASE_URL` is configured, and in
/// tests. Cloning shares the same tables.
///
/// One lock guards all tables, so every write is applied whole and
/// `clear_all` is atomic with respect to readers.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadingStore for MemoryStore {
    // ---
    async fn append_reading(&self, reading: &Reading) -> Result<()> {
        // ---
        let mut tables = self.tables.write().await;
        let log = tables.readings.entry(reading.city.clone()).or_default();

        // Keep each log sorted by observation time; ties stay in arrival order.
        let at = log.partition_point(|r| r.observed_at <= reading.observed_at);
        log.insert(at, reading.clone());
        Ok(())
    }

    async fn readings_between(&self, city: &str, from: i64, to: i64) -> Result<Vec<Reading>> {
        // ---
        let tables = self.tables.read().await;
        Ok(tables
            .readings
            .get(city)
            .map(|log| {
                log.iter()
                    .filter(|r| r.observed_at >= from && r.observed_at < to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

impl ThresholdStore for MemoryStore {
    // ---
    async fn upsert_threshold(&self, threshold: &Threshold) -> Result<()> {
        // ---
        threshold.validate()?;
        self.tables
            .write()
            .await
            .thresholds
            .insert(threshold.city.clone(), threshold.clone());
        Ok(())
    }

    async fn threshold(&self, city: &str) -> Result<Option<Threshold>> {
        Ok(self.tables.read().await.thresholds.get(city).cloned())
    }
}

impl AlertStore for MemoryStore {
    // ---
    async fn append_alert(&self, alert: &Alert) -> Result<()> {
        // ---
        self.tables
            .write()
            .await
            .alerts
            .entry(alert.city.clone())
            .or_default()
            .push(alert.clone());
        Ok(())
    }

    async fn alerts_since(&self, city: &str, since: i64, limit: usize) -> Result<Vec<Alert>> {
        // ---
        let tables = self.tables.read().await;
        let mut alerts: Vec<Alert> = tables
            .alerts
            .get(city)
            .map(|log| log.iter().filter(|a| a.observed_at >= since).cloned().collect())
            .unwrap_or_default();

        // Stable sort: alerts with equal timestamps keep newest-appended first.
        alerts.reverse();
        alerts.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));
        alerts.truncate(limit);
        Ok(alerts)
    }
}

impl Store for MemoryStore {
    // ---
    async fn clear_all(&self) -> Result<()> {
        // ---
        let mut tables = self.tables.write().await;
        *tables = Tables::default();
        tracing::info!("In-memory store cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::WeatherError;
    use crate::models::AlertType;
    use tokio_test::{assert_err, assert_ok};

    fn reading(city: &str, temp: f64, at: i64) -> Reading {
        // ---
        Reading {
            city: city.to_string(),
            temperature_celsius: temp,
            feels_like_celsius: temp,
            condition: "Clear".to_string(),
            observed_at: at,
        }
    }

    fn alert(city: &str, at: i64) -> Alert {
        // ---
        Alert {
            city: city.to_string(),
            alert_type: AlertType::ConsecutiveHighTemperature,
            message: format!("alert at {}", at),
            observed_at: at,
        }
    }

    #[tokio::test]
    async fn test_readings_filtered_by_city_and_range() {
        // ---
        let store = MemoryStore::new();
        for (city, temp, at) in [
            ("Delhi", 30.0, 300),
            ("Delhi", 31.0, 100),
            ("Mumbai", 28.0, 150),
            ("Delhi", 32.0, 200),
        ] {
            assert_ok!(store.append_reading(&reading(city, temp, at)).await);
        }

        let delhi = store.readings_between("Delhi", 100, 300).await.unwrap();
        let times: Vec<i64> = delhi.iter().map(|r| r.observed_at).collect();
        assert_eq!(times, vec![100, 200]);

        assert!(store.readings_between("Chennai", 0, 1000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_upsert_overwrites() {
        // ---
        let store = MemoryStore::new();
        assert_ok!(store.upsert_threshold(&Threshold::new("Delhi", 5.0, 40.0).unwrap()).await);
        assert_ok!(store.upsert_threshold(&Threshold::new("Delhi", 10.0, 38.0).unwrap()).await);

        let t = store.threshold("Delhi").await.unwrap().unwrap();
        assert_eq!((t.min_celsius, t.max_celsius), (10.0, 38.0));
        assert!(store.threshold("Mumbai").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_threshold_upsert_rejects_inverted_bounds() {
        // ---
        let store = MemoryStore::new();
        let inverted = Threshold {
            city: "Delhi".to_string(),
            min_celsius: 40.0,
            max_celsius: 10.0,
        };
        let err = assert_err!(store.upsert_threshold(&inverted).await);
        assert!(matches!(err, WeatherError::Validation(_)));
        assert!(store.threshold("Delhi").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_converge() {
        // ---
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let t = Threshold::new("Delhi", i as f64, i as f64 + 10.0).unwrap();
                store.upsert_threshold(&t).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        // Whichever write landed last, min and max come from the same write.
        let t = store.threshold("Delhi").await.unwrap().unwrap();
        assert_eq!(t.max_celsius - t.min_celsius, 10.0);

        assert_ok!(store.upsert_threshold(&Threshold::new("Delhi", 1.0, 2.0).unwrap()).await);
        let t = store.threshold("Delhi").await.unwrap().unwrap();
        assert_eq!((t.min_celsius, t.max_celsius), (1.0, 2.0));
    }

    #[tokio::test]
    async fn test_alerts_newest_first_with_limit() {
        // ---
        let store = MemoryStore::new();
        for at in [100, 400, 200, 300] {
            assert_ok!(store.append_alert(&alert("Delhi", at)).await);
        }
        assert_ok!(store.append_alert(&alert("Mumbai", 500)).await);

        let recent = store.alerts_since("Delhi", 150, 10).await.unwrap();
        let times: Vec<i64> = recent.iter().map(|a| a.observed_at).collect();
        assert_eq!(times, vec![400, 300, 200]);

        let limited = store.alerts_since("Delhi", 0, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].observed_at, 400);
    }

    #[tokio::test]
    async fn test_clear_all_empties_every_table() {
        // ---
        let store = MemoryStore::new();
        assert_ok!(store.append_reading(&reading("Delhi", 30.0, 100)).await);
        assert_ok!(store.append_alert(&alert("Delhi", 100)).await);
        assert_ok!(store.upsert_threshold(&Threshold::new("Delhi", 0.0, 30.0).unwrap()).await);

        assert_ok!(store.clear_all().await);

        assert!(store.readings_between("Delhi", 0, i64::MAX).await.unwrap().is_empty());
        assert!(store.alerts_since("Delhi", 0, 10).await.unwrap().is_empty());
        assert!(store.threshold("Delhi").await.unwrap().is_none());
    }
}
