//! Core-facing boundary shared by the HTTP layer and the tests.
//!
//! Units are parsed and applied here: inbound values are converted to
//! Celsius before reaching a store, outbound values are converted only when
//! rendered.

use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::aggregate::{self, DailySummary};
use crate::error::{Result, WeatherError};
use crate::ingest::{IngestSettings, Ingestor, PassReport};
use crate::models::{Alert, Threshold, WeatherReport};
use crate::source::WeatherSource;
use crate::store::Store;
use crate::tracker::{AlertTracker, BreachState, TrackerConfig};
use crate::units::{self, Unit};

/// Alerts returned when the caller gives no limit.
pub const DEFAULT_ALERT_LIMIT: usize = 10;

// ---

#[derive(Debug, Clone)]
pub struct WeatherService<S, W> {
    store: S,
    ingestor: Ingestor<S, W>,
    tracker: Arc<AlertTracker>,
}

impl<S: Store, W: WeatherSource> WeatherService<S, W> {
    // ---
    pub fn new(
        store: S,
        source: W,
        cities: Vec<String>,
        tracker_config: TrackerConfig,
        ingest_settings: IngestSettings,
    ) -> Self {
        // ---
        let tracker = Arc::new(AlertTracker::new(tracker_config));
        let ingestor = Ingestor::new(
            store.clone(),
            source,
            Arc::clone(&tracker),
            cities,
            ingest_settings,
        );
        WeatherService {
            store,
            ingestor,
            tracker,
        }
    }

    /// Handle for the background ingestion loop. Shares the tracker and
    /// store with this service.
    pub fn ingestor(&self) -> Ingestor<S, W> {
        self.ingestor.clone()
    }

    pub fn cities(&self) -> &[String] {
        self.ingestor.cities()
    }

    fn ensure_known(&self, city: &str) -> Result<()> {
        // ---
        if self.cities().iter().any(|c| c == city) {
            Ok(())
        } else {
            Err(WeatherError::NotFound(format!("city '{}' is not monitored", city)))
        }
    }

    /// Store bounds for `city` given in `unit`.
    pub async fn set_threshold(&self, city: &str, min: f64, max: f64, unit: &str) -> Result<Threshold> {
        // ---
        let unit: Unit = unit.parse()?;
        self.ensure_known(city)?;

        let threshold = Threshold::new(
            city,
            units::to_celsius(min, unit),
            units::to_celsius(max, unit),
        )?;
        self.store.upsert_threshold(&threshold).await?;

        tracing::info!(
            "Threshold for {} set to [{:.2}, {:.2}]°C",
            city,
            threshold.min_celsius,
            threshold.max_celsius
        );
        Ok(threshold)
    }

    pub async fn threshold(&self, city: &str) -> Result<Option<Threshold>> {
        self.ensure_known(city)?;
        self.store.threshold(city).await
    }

    /// Fetch every city now through the ingestion pipeline and return the
    /// readings that were stored, in `unit`.
    pub async fn current_weather(&self, unit: Unit) -> Vec<WeatherReport> {
        // ---
        let report: PassReport = self.ingestor.run_pass(None).await;
        report
            .readings()
            .map(|r| WeatherReport::from_reading(r, unit))
            .collect()
    }

    pub async fn daily_summary(&self, city: &str, unit: Unit) -> Result<DailySummary> {
        self.daily_summary_at(city, unit, &Local::now()).await
    }

    pub async fn daily_summary_at<Tz: chrono::TimeZone>(
        &self,
        city: &str,
        unit: Unit,
        now: &DateTime<Tz>,
    ) -> Result<DailySummary> {
        // ---
        self.ensure_known(city)?;
        let since = aggregate::start_of_day(now);
        let readings = self
            .store
            .readings_between(city, since, now.timestamp() + 1)
            .await?;
        aggregate::daily_summary(city, &readings, unit, now)
    }

    pub async fn monthly_history(&self, city: &str, unit: Unit) -> Result<Vec<DailySummary>> {
        self.monthly_history_at(city, unit, &Local::now()).await
    }

    pub async fn monthly_history_at<Tz: chrono::TimeZone>(
        &self,
        city: &str,
        unit: Unit,
        now: &DateTime<Tz>,
    ) -> Result<Vec<DailySummary>> {
        // ---
        self.ensure_known(city)?;
        let (from, to) = aggregate::monthly_window(now);
        let readings = self.store.readings_between(city, from, to).await?;
        Ok(aggregate::monthly_summary(city, &readings, unit, now))
    }

    /// Alerts for `city` from the last `within_secs` seconds (all of them
    /// when `None`), newest first.
    pub async fn alerts_for_city(
        &self,
        city: &str,
        within_secs: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<Alert>> {
        self.alerts_for_city_at(city, within_secs, limit, Local::now().timestamp())
            .await
    }

    pub async fn alerts_for_city_at(
        &self,
        city: &str,
        within_secs: Option<i64>,
        limit: Option<usize>,
        now: i64,
    ) -> Result<Vec<Alert>> {
        // ---
        self.ensure_known(city)?;
        let since = match within_secs {
            Some(secs) if secs < 0 => {
                return Err(WeatherError::Validation(format!(
                    "within_secs must not be negative, got {}",
                    secs
                )))
            }
            Some(secs) => now.saturating_sub(secs),
            None => i64::MIN,
        };
        self.store
            .alerts_since(city, since, limit.unwrap_or(DEFAULT_ALERT_LIMIT))
            .await
    }

    /// Wipe every store and all breach state.
    pub async fn clear_all(&self) -> Result<()> {
        // ---
        let _exclusive = self.tracker.exclusive().await;
        self.store.clear_all().await?;
        self.tracker.reset();
        tracing::warn!("All readings, alerts, thresholds and breach state cleared");
        Ok(())
    }

    /// Snapshot of a city's streak, for diagnostics.
    pub async fn tracker_state(&self, city: &str) -> Result<Option<BreachState>> {
        self.ensure_known(city)?;
        Ok(self.tracker.state(city).await)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::ingest::ingest_reading;
    use crate::models::{AlertType, Reading};
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    /// Source that always fails; tests feed readings through `ingest_reading`.
    #[derive(Clone)]
    struct Offline;

    impl WeatherSource for Offline {
        async fn fetch(&self, city: &str) -> Result<Reading> {
            Err(WeatherError::UpstreamFetch {
                city: city.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    fn service() -> WeatherService<MemoryStore, Offline> {
        WeatherService::new(
            MemoryStore::new(),
            Offline,
            vec!["Delhi".to_string(), "Mumbai".to_string()],
            TrackerConfig::default(),
            IngestSettings::default(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap()
    }

    fn reading(temp: f64, minutes_ago: i64) -> Reading {
        // ---
        Reading {
            city: "Delhi".to_string(),
            temperature_celsius: temp,
            feels_like_celsius: temp,
            condition: "Clear".to_string(),
            observed_at: now().timestamp() - minutes_ago * 60,
        }
    }

    async fn feed(svc: &WeatherService<MemoryStore, Offline>, r: Reading) {
        ingest_reading(&svc.store, &svc.tracker, r).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_threshold_converts_to_celsius() {
        // ---
        let svc = service();
        let t = svc.set_threshold("Delhi", 50.0, 95.0, "imperial").await.unwrap();
        assert!((t.min_celsius - 10.0).abs() < 1e-9);
        assert!((t.max_celsius - 35.0).abs() < 1e-9);

        let stored = svc.threshold("Delhi").await.unwrap().unwrap();
        assert_eq!(stored, t);
    }

    #[tokio::test]
    async fn test_set_threshold_rejections() {
        // ---
        let svc = service();
        assert!(matches!(
            svc.set_threshold("Delhi", 0.0, 30.0, "rankine").await,
            Err(WeatherError::InvalidUnit(_))
        ));
        assert!(matches!(
            svc.set_threshold("Delhi", 30.0, 0.0, "metric").await,
            Err(WeatherError::Validation(_))
        ));
        assert!(matches!(
            svc.set_threshold("Paris", 0.0, 30.0, "metric").await,
            Err(WeatherError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_threshold_drives_alerting() {
        // ---
        let svc = service();
        svc.set_threshold("Delhi", 15.0, 30.0, "metric").await.unwrap();
        feed(&svc, reading(12.0, 10)).await;
        feed(&svc, reading(11.0, 5)).await;

        let alerts = svc
            .alerts_for_city_at("Delhi", Some(3600), None, now().timestamp())
            .await
            .unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::ConsecutiveLowTemperature);

        // Outside the requested window.
        let none = svc
            .alerts_for_city_at("Delhi", Some(60), None, now().timestamp())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_summaries_through_service() {
        // ---
        let svc = service();
        for (temp, ago) in [(20.0, 30), (22.0, 20), (24.0, 10)] {
            feed(&svc, reading(temp, ago)).await;
        }

        let daily = svc.daily_summary_at("Delhi", Unit::Metric, &now()).await.unwrap();
        assert_eq!(
            (daily.avg_temperature, daily.max_temperature, daily.min_temperature),
            (22.0, 24.0, 20.0)
        );

        let monthly = svc.monthly_history_at("Delhi", Unit::Metric, &now()).await.unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].reading_count, 3);

        assert!(matches!(
            svc.daily_summary_at("Mumbai", Unit::Metric, &now()).await,
            Err(WeatherError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_all_leaves_no_stale_data() {
        // ---
        let svc = service();
        svc.set_threshold("Delhi", 15.0, 30.0, "metric").await.unwrap();
        feed(&svc, reading(40.0, 10)).await;
        feed(&svc, reading(41.0, 5)).await;
        feed(&svc, reading(42.0, 1)).await;

        svc.clear_all().await.unwrap();

        assert!(matches!(
            svc.daily_summary_at("Delhi", Unit::Metric, &now()).await,
            Err(WeatherError::NotFound(_))
        ));
        assert!(svc
            .monthly_history_at("Delhi", Unit::Metric, &now())
            .await
            .unwrap()
            .is_empty());
        assert!(svc
            .alerts_for_city_at("Delhi", None, None, now().timestamp())
            .await
            .unwrap()
            .is_empty());
        assert!(svc.threshold("Delhi").await.unwrap().is_none());
        assert!(svc.tracker_state("Delhi").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_current_weather_skips_failed_cities() {
        // ---
        let svc = service();
        assert!(svc.current_weather(Unit::Metric).await.is_empty());
    }
}
