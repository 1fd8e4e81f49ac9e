//! Routes gateway.
//!
//! Each sibling module exports a subrouter; this module merges them and
//! attaches the shared [`WeatherService`] as state, so `main.rs` never needs
//! to know about individual endpoints.

use axum::Router;

use crate::source::WeatherSource;
use crate::store::Store;
use crate::WeatherService;

mod admin;
mod alerts;
mod health;
mod weather;

// ---

pub fn router<S: Store, W: WeatherSource>(service: WeatherService<S, W>) -> Router {
    // ---
    Router::new()
        .merge(weather::router())
        .merge(alerts::router())
        .merge(admin::router())
        .merge(health::router())
        .with_state(service)
}
