use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use weatherwatch::ingest::IngestSettings;
use weatherwatch::source::WeatherSource;
use weatherwatch::store::MemoryStore;
use weatherwatch::tracker::TrackerConfig;
use weatherwatch::{routes, Reading, WeatherError, WeatherService};

// ---

/// Delhi reports 40 °C one minute apart on every fetch, starting now; every
/// other city is unreachable.
#[derive(Clone)]
struct HotDelhi {
    base: i64,
    calls: Arc<AtomicI64>,
}

impl HotDelhi {
    fn new() -> Self {
        HotDelhi {
            base: Utc::now().timestamp(),
            calls: Arc::new(AtomicI64::new(0)),
        }
    }
}

impl WeatherSource for HotDelhi {
    async fn fetch(&self, city: &str) -> Result<Reading, WeatherError> {
        // ---
        if city != "Delhi" {
            return Err(WeatherError::UpstreamFetch {
                city: city.to_string(),
                reason: "503 Service Unavailable".to_string(),
            });
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Reading {
            city: city.to_string(),
            temperature_celsius: 40.0,
            feels_like_celsius: 44.0,
            condition: "Haze".to_string(),
            observed_at: self.base + n * 60,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WeatherReport {
    city: String,
    temperature: f64,
    unit_symbol: String,
}

#[derive(Debug, Deserialize)]
struct Alert {
    city: String,
    alert_type: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DailySummary {
    avg_temperature: f64,
    max_temperature: f64,
    min_temperature: f64,
    dominant_condition: String,
}

async fn spawn_app() -> Result<String> {
    // ---
    let service = WeatherService::new(
        MemoryStore::new(),
        HotDelhi::new(),
        vec!["Delhi".to_string(), "Mumbai".to_string()],
        TrackerConfig::default(),
        IngestSettings::default(),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, routes::router(service)).await.ok();
    });
    Ok(format!("http://{}", addr))
}

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let body: serde_json::Value = Client::new()
        .get(format!("{}/health", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn current_weather_converts_and_skips_failures() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    let reports: Vec<WeatherReport> = client
        .get(format!("{}/weather/current?units=imperial", base))
        .send()
        .await?
        .json()
        .await?;

    // Mumbai fails upstream and is skipped.
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].city, "Delhi");
    assert_eq!(reports[0].temperature, 104.0);
    assert_eq!(reports[0].unit_symbol, "°F");

    let bad = client
        .get(format!("{}/weather/current?units=kelvin", base))
        .send()
        .await?;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn consecutive_breaches_raise_one_alert() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    let first = client
        .get(format!("{}/weather/current", base))
        .send()
        .await?;
    assert_eq!(first.status(), StatusCode::OK);
    let alerts: Vec<Alert> = client
        .get(format!("{}/alerts/Delhi", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(alerts.is_empty(), "a single breach must not alert");

    client
        .get(format!("{}/weather/current", base))
        .send()
        .await?;
    let alerts: Vec<Alert> = client
        .get(format!("{}/alerts/Delhi?within_secs=86400", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].city, "Delhi");
    assert_eq!(alerts[0].alert_type, "consecutive_high_temperature");
    assert!(alerts[0].message.contains("35.00°C"));

    let summary: DailySummary = client
        .get(format!("{}/weather/daily-summary/Delhi", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(summary.avg_temperature, 40.0);
    assert_eq!(summary.max_temperature, 40.0);
    assert_eq!(summary.min_temperature, 40.0);
    assert_eq!(summary.dominant_condition, "Haze");
    Ok(())
}

#[tokio::test]
async fn threshold_requests_are_validated() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();
    let url = format!("{}/alerts/threshold", base);

    let ok = client
        .post(&url)
        .json(&json!({"city": "Delhi", "min_temp": 50.0, "max_temp": 104.0, "units": "imperial"}))
        .send()
        .await?;
    assert_eq!(ok.status(), StatusCode::OK);
    let body: serde_json::Value = ok.json().await?;
    assert_eq!(body["threshold"]["min_celsius"], 10.0);
    assert_eq!(body["threshold"]["max_celsius"], 40.0);

    let inverted = client
        .post(&url)
        .json(&json!({"city": "Delhi", "min_temp": 30.0, "max_temp": 10.0}))
        .send()
        .await?;
    assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);

    let bad_unit = client
        .post(&url)
        .json(&json!({"city": "Delhi", "min_temp": 0.0, "max_temp": 10.0, "units": "rankine"}))
        .send()
        .await?;
    assert_eq!(bad_unit.status(), StatusCode::BAD_REQUEST);

    let unknown = client
        .post(&url)
        .json(&json!({"city": "Paris", "min_temp": 0.0, "max_temp": 10.0}))
        .send()
        .await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn clear_all_leaves_nothing_behind() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    for _ in 0..2 {
        client
            .get(format!("{}/weather/current", base))
            .send()
            .await?;
    }

    let cleared = client
        .delete(format!("{}/admin/data", base))
        .send()
        .await?;
    assert_eq!(cleared.status(), StatusCode::NO_CONTENT);

    let summary = client
        .get(format!("{}/weather/daily-summary/Delhi", base))
        .send()
        .await?;
    assert_eq!(summary.status(), StatusCode::NOT_FOUND);

    let alerts: Vec<Alert> = client
        .get(format!("{}/alerts/Delhi", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(alerts.is_empty());

    let history: Vec<serde_json::Value> = client
        .get(format!("{}/weather/Delhi/last_month", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(history.is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_city_is_not_found() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    for path in ["/weather/daily-summary/Paris", "/alerts/Paris", "/weather/Paris/last_month"] {
        let resp = client.get(format!("{}{}", base, path)).send().await?;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{}", path);
    }
    Ok(())
}
