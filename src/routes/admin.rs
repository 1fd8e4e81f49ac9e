use axum::{extract::State, http::StatusCode, routing::delete, Router};
use tracing::warn;

use crate::error::Result;
use crate::source::WeatherSource;
use crate::store::Store;
use crate::WeatherService;

// ---

pub fn router<S: Store, W: WeatherSource>() -> Router<WeatherService<S, W>> {
    Router::new().route("/admin/data", delete(clear_all::<S, W>))
}

/// Wipe readings, alerts, thresholds and breach state.
async fn clear_all<S: Store, W: WeatherSource>(
    State(service): State<WeatherService<S, W>>,
) -> Result<StatusCode> {
    // ---
    warn!("DELETE /admin/data - clearing all data");
    service.clear_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
