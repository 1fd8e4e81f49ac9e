//! Error taxonomy shared by the stores, the tracker, ingestion and the HTTP
//! layer.

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum WeatherError {
    // ---
    /// Unit string not one of `metric`, `imperial`, `standard`.
    #[error("invalid unit '{0}' (expected metric, imperial or standard)")]
    InvalidUnit(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown city, or no data in the queried window.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient provider failure. Always skippable.
    #[error("upstream fetch failed for {city}: {reason}")]
    UpstreamFetch { city: String, reason: String },

    #[error("malformed reading for {city}: {reason}")]
    MalformedReading { city: String, reason: String },

    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, WeatherError>;

impl From<sqlx::Error> for WeatherError {
    fn from(e: sqlx::Error) -> Self {
        WeatherError::Store(e.to_string())
    }
}

impl WeatherError {
    // ---
    pub fn status_code(&self) -> StatusCode {
        // ---
        match self {
            WeatherError::InvalidUnit(_) | WeatherError::Validation(_) => StatusCode::BAD_REQUEST,
            WeatherError::NotFound(_) => StatusCode::NOT_FOUND,
            WeatherError::UpstreamFetch { .. } | WeatherError::MalformedReading { .. } => {
                StatusCode::BAD_GATEWAY
            }
            WeatherError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON body returned for every failed request.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for WeatherError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_status_mapping() {
        // ---
        assert_eq!(
            WeatherError::InvalidUnit("kelvin".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WeatherError::Validation("min > max".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WeatherError::NotFound("Paris".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            WeatherError::UpstreamFetch {
                city: "Delhi".into(),
                reason: "timed out".into()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            WeatherError::Store("disk full".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages_name_the_city() {
        // ---
        let e = WeatherError::MalformedReading {
            city: "Mumbai".into(),
            reason: "missing feels_like".into(),
        };
        assert_eq!(
            e.to_string(),
            "malformed reading for Mumbai: missing feels_like"
        );
    }
}
