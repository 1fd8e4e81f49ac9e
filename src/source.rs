//! Inbound weather data.
//!
//! [`WeatherSource`] is the only way readings enter the service. The
//! production implementation talks to the OpenWeatherMap current-weather
//! endpoint; tests substitute scripted sources.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;

use crate::error::{Result, WeatherError};
use crate::models::{RawWeather, Reading};
use crate::units::Unit;

// ---

pub trait WeatherSource: Clone + Send + Sync + 'static {
    /// Fetch the latest reading for `city`, normalized to Celsius.
    ///
    /// Errors are opaque to callers and always treated as skippable.
    fn fetch(&self, city: &str) -> impl Future<Output = Result<Reading>> + Send;
}

/// OpenWeatherMap settings needed by [`OpenWeatherClient`].
#[derive(Debug, Clone)]
pub struct OpenWeatherSettings {
    pub base_url: String,
    pub api_key: String,
    /// Country code appended to every city query (`q={city},{country}`).
    pub country: String,
    /// Unit the provider is asked to report in.
    pub units: Unit,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    settings: OpenWeatherSettings,
}

impl OpenWeatherClient {
    // ---
    /// Build the HTTP client. Failure is a startup error.
    pub fn new(settings: OpenWeatherSettings) -> anyhow::Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, settings })
    }
}

impl WeatherSource for OpenWeatherClient {
    // ---
    async fn fetch(&self, city: &str) -> Result<Reading> {
        // ---
        let upstream = |reason: String| WeatherError::UpstreamFetch {
            city: city.to_string(),
            reason,
        };

        let query = format!("{},{}", city, self.settings.country);
        tracing::debug!("Fetching weather for {}", query);

        let response = self
            .client
            .get(&self.settings.base_url)
            .query(&[
                ("q", query.as_str()),
                ("appid", self.settings.api_key.as_str()),
                ("units", self.settings.units.as_str()),
            ])
            .send()
            .await
            .map_err(|e| upstream(e.to_string()))?
            .error_for_status()
            .map_err(|e| upstream(e.to_string()))?;

        let body: serde_json::Value = response.json().await.map_err(|e| upstream(e.to_string()))?;
        tracing::trace!("{} raw response: {}", city, body);

        let raw: RawWeather =
            serde_json::from_value(body).map_err(|e| WeatherError::MalformedReading {
                city: city.to_string(),
                reason: e.to_string(),
            })?;

        raw.to_reading(city, self.settings.units)
    }
}
