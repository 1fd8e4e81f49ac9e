use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::models::{Alert, Threshold};
use crate::source::WeatherSource;
use crate::store::Store;
use crate::WeatherService;

// ---

pub fn router<S: Store, W: WeatherSource>() -> Router<WeatherService<S, W>> {
    // ---
    Router::new()
        .route("/alerts/threshold", post(set_threshold::<S, W>))
        .route("/alerts/{city}", get(city_alerts::<S, W>))
}

/// Body of `POST /alerts/threshold`. Bounds are in `units`, Celsius by
/// default.
#[derive(Debug, Deserialize)]
pub struct ThresholdRequest {
    city: String,
    min_temp: f64,
    max_temp: f64,
    #[serde(default = "default_units")]
    units: String,
}

fn default_units() -> String {
    "metric".to_string()
}

#[derive(Debug, Serialize)]
pub struct ThresholdResponse {
    message: String,
    threshold: Threshold,
}

async fn set_threshold<S: Store, W: WeatherSource>(
    State(service): State<WeatherService<S, W>>,
    Json(req): Json<ThresholdRequest>,
) -> Result<Json<ThresholdResponse>> {
    // ---
    info!("POST /alerts/threshold - {:?}", req);
    let threshold = service
        .set_threshold(&req.city, req.min_temp, req.max_temp, &req.units)
        .await?;
    Ok(Json(ThresholdResponse {
        message: format!("Thresholds set for {}", req.city),
        threshold,
    }))
}

/// Query parameters for `GET /alerts/{city}`.
#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    /// Only alerts from the last `within_secs` seconds.
    within_secs: Option<i64>,
    limit: Option<usize>,
}

async fn city_alerts<S: Store, W: WeatherSource>(
    Path(city): Path<String>,
    Query(params): Query<AlertsQuery>,
    State(service): State<WeatherService<S, W>>,
) -> Result<Json<Vec<Alert>>> {
    // ---
    info!("GET /alerts/{} - {:?}", city, params);
    let alerts = service
        .alerts_for_city(&city, params.within_secs, params.limit)
        .await?;
    Ok(Json(alerts))
}
