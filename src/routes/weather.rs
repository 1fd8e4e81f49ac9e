use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::aggregate::DailySummary;
use crate::error::Result;
use crate::models::WeatherReport;
use crate::source::WeatherSource;
use crate::store::Store;
use crate::units::Unit;
use crate::WeatherService;

// ---

pub fn router<S: Store, W: WeatherSource>() -> Router<WeatherService<S, W>> {
    // ---
    Router::new()
        .route("/weather/current", get(current::<S, W>))
        .route("/weather/daily-summary/{city}", get(daily_summary::<S, W>))
        .route("/weather/{city}/last_month", get(last_month::<S, W>))
}

/// `?units=metric|imperial|standard`, Celsius when absent.
#[derive(Debug, Deserialize)]
pub struct UnitQuery {
    units: Option<String>,
}

impl UnitQuery {
    fn unit(&self) -> Result<Unit> {
        Unit::parse_or_default(self.units.as_deref())
    }
}

/// Fetch every city now, store and evaluate the readings, and return them.
async fn current<S: Store, W: WeatherSource>(
    Query(params): Query<UnitQuery>,
    State(service): State<WeatherService<S, W>>,
) -> Result<Json<Vec<WeatherReport>>> {
    // ---
    let unit = params.unit()?;
    info!("GET /weather/current ({})", unit);
    Ok(Json(service.current_weather(unit).await))
}

async fn daily_summary<S: Store, W: WeatherSource>(
    Path(city): Path<String>,
    Query(params): Query<UnitQuery>,
    State(service): State<WeatherService<S, W>>,
) -> Result<Json<DailySummary>> {
    // ---
    let unit = params.unit()?;
    info!("GET /weather/daily-summary/{} ({})", city, unit);
    Ok(Json(service.daily_summary(&city, unit).await?))
}

async fn last_month<S: Store, W: WeatherSource>(
    Path(city): Path<String>,
    Query(params): Query<UnitQuery>,
    State(service): State<WeatherService<S, W>>,
) -> Result<Json<Vec<DailySummary>>> {
    // ---
    let unit = params.unit()?;
    info!("GET /weather/{}/last_month ({})", city, unit);
    Ok(Json(service.monthly_history(&city, unit).await?))
}
