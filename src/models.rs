//! Data models for readings, thresholds and alerts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WeatherError;
use crate::units::{self, Unit};

/// High bound applied to cities without a user threshold.
pub const DEFAULT_MAX_CELSIUS: f64 = 35.0;

// ---

/// Raw payload of the OpenWeatherMap current-weather endpoint.
///
/// Only the fields used by the pipeline are modelled. Fields that are often
/// absent are optional so a partial payload is reported as a malformed
/// reading instead of a decode failure.
#[derive(Debug, Deserialize)]
pub struct RawWeather {
    // ---
    pub main: RawMain,
    #[serde(default)]
    pub weather: Vec<RawCondition>,
    pub dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RawMain {
    pub temp: Option<f64>,
    pub feels_like: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RawCondition {
    pub main: String,
}

/// Normalized reading. Temperatures are always Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub city: String,
    pub temperature_celsius: f64,
    pub feels_like_celsius: f64,
    pub condition: String,
    pub observed_at: i64,
}

impl RawWeather {
    // ---
    /// Normalize a provider payload reported in `unit` into a Celsius
    /// [`Reading`] for `city`.
    pub fn to_reading(&self, city: &str, unit: Unit) -> Result<Reading, WeatherError> {
        // ---
        let malformed = |reason: &str| WeatherError::MalformedReading {
            city: city.to_string(),
            reason: reason.to_string(),
        };

        let temp = self.main.temp.ok_or_else(|| malformed("missing temp"))?;
        let feels_like = self
            .main
            .feels_like
            .ok_or_else(|| malformed("missing feels_like"))?;
        let condition = self
            .weather
            .first()
            .map(|w| w.main.clone())
            .ok_or_else(|| malformed("missing weather condition"))?;
        let observed_at = self.dt.ok_or_else(|| malformed("missing dt"))?;

        let reading = Reading {
            city: city.to_string(),
            temperature_celsius: units::to_celsius(temp, unit),
            feels_like_celsius: units::to_celsius(feels_like, unit),
            condition,
            observed_at,
        };
        reading.validate()?;
        Ok(reading)
    }
}

impl Reading {
    // ---
    /// Reject readings that cannot be evaluated against a threshold.
    pub fn validate(&self) -> Result<(), WeatherError> {
        // ---
        let malformed = |reason: String| WeatherError::MalformedReading {
            city: self.city.clone(),
            reason,
        };
        if !self.temperature_celsius.is_finite() {
            return Err(malformed(format!(
                "temperature is not finite: {}",
                self.temperature_celsius
            )));
        }
        if !self.feels_like_celsius.is_finite() {
            return Err(malformed(format!(
                "feels_like is not finite: {}",
                self.feels_like_celsius
            )));
        }
        if self.condition.trim().is_empty() {
            return Err(malformed("empty weather condition".to_string()));
        }
        Ok(())
    }
}

/// A reading rendered in the caller's unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherReport {
    // ---
    pub city: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub main_condition: String,
    pub timestamp: i64,
    pub unit_symbol: String,
}

impl WeatherReport {
    // ---
    pub fn from_reading(reading: &Reading, unit: Unit) -> Self {
        WeatherReport {
            city: reading.city.clone(),
            temperature: units::round2(units::from_celsius(reading.temperature_celsius, unit)),
            feels_like: units::round2(units::from_celsius(reading.feels_like_celsius, unit)),
            main_condition: reading.condition.clone(),
            timestamp: reading.observed_at,
            unit_symbol: unit.symbol().to_string(),
        }
    }
}

/// User-configured bounds for one city, in Celsius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    // ---
    pub city: String,
    pub min_celsius: f64,
    pub max_celsius: f64,
}

impl Threshold {
    // ---
    pub fn new(city: impl Into<String>, min_celsius: f64, max_celsius: f64) -> Result<Self, WeatherError> {
        let threshold = Threshold {
            city: city.into(),
            min_celsius,
            max_celsius,
        };
        threshold.validate()?;
        Ok(threshold)
    }

    pub fn validate(&self) -> Result<(), WeatherError> {
        // ---
        if !self.min_celsius.is_finite() || !self.max_celsius.is_finite() {
            return Err(WeatherError::Validation(format!(
                "threshold bounds for {} must be finite",
                self.city
            )));
        }
        if self.min_celsius > self.max_celsius {
            return Err(WeatherError::Validation(format!(
                "min {} exceeds max {} for {}",
                self.min_celsius, self.max_celsius, self.city
            )));
        }
        Ok(())
    }
}

/// Alert kinds. Only the `Consecutive*` kinds are emitted by the tracker;
/// the single-reading kinds stay decodable for rows written by the older
/// per-sample checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowTemperature,
    HighTemperature,
    ConsecutiveLowTemperature,
    ConsecutiveHighTemperature,
}

impl AlertType {
    // ---
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::LowTemperature => "low_temperature",
            AlertType::HighTemperature => "high_temperature",
            AlertType::ConsecutiveLowTemperature => "consecutive_low_temperature",
            AlertType::ConsecutiveHighTemperature => "consecutive_high_temperature",
        }
    }
}

impl FromStr for AlertType {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low_temperature" => Ok(AlertType::LowTemperature),
            "high_temperature" => Ok(AlertType::HighTemperature),
            "consecutive_low_temperature" => Ok(AlertType::ConsecutiveLowTemperature),
            "consecutive_high_temperature" => Ok(AlertType::ConsecutiveHighTemperature),
            other => Err(WeatherError::Store(format!("unknown alert type '{}'", other))),
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    // ---
    pub city: String,
    pub alert_type: AlertType,
    pub message: String,
    pub observed_at: i64,
}
