//! Temperature unit normalization.
//!
//! Everything is stored in Celsius. Values are converted with [`to_celsius`]
//! when they enter the service and with [`from_celsius`] only when they are
//! rendered for a caller.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::WeatherError;

const KELVIN_OFFSET: f64 = 273.15;

// ---

/// Unit families as named by the OpenWeatherMap `units` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Celsius.
    #[default]
    Metric,
    /// Fahrenheit.
    Imperial,
    /// Kelvin.
    Standard,
}

impl Unit {
    // ---
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
            Unit::Standard => "standard",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Metric => "°C",
            Unit::Imperial => "°F",
            Unit::Standard => "K",
        }
    }

    /// Parse an optional query-string value, defaulting to Celsius.
    pub fn parse_or_default(value: Option<&str>) -> Result<Unit, WeatherError> {
        value.map(str::parse::<Unit>).transpose().map(Option::unwrap_or_default)
    }
}

impl FromStr for Unit {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Unit::Metric),
            "imperial" => Ok(Unit::Imperial),
            "standard" => Ok(Unit::Standard),
            _ => Err(WeatherError::InvalidUnit(s.to_string())),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a temperature reported in `unit` to Celsius.
pub fn to_celsius(value: f64, unit: Unit) -> f64 {
    // ---
    match unit {
        Unit::Metric => value,
        Unit::Imperial => (value - 32.0) * 5.0 / 9.0,
        Unit::Standard => value - KELVIN_OFFSET,
    }
}

/// Convert a Celsius temperature to `unit` for display.
pub fn from_celsius(value: f64, unit: Unit) -> f64 {
    // ---
    match unit {
        Unit::Metric => value,
        Unit::Imperial => value * 9.0 / 5.0 + 32.0,
        Unit::Standard => value + KELVIN_OFFSET,
    }
}

/// Round to two decimal places, the precision used in every summary.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
