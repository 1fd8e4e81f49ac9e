//! `weatherwatch` samples weather for a fixed set of cities, stores
//! Celsius-normalized readings and raises alerts when a city breaches its
//! temperature bounds for several consecutive samples.
//!
//! Module layout, leaves first:
//! - [`units`] converts between Celsius and the provider's unit families
//! - [`store`] holds the reading, threshold and alert stores
//! - [`tracker`] is the per-city consecutive-breach state machine
//! - [`ingest`] runs the periodic fetch, store and evaluate loop
//! - [`aggregate`] computes daily and monthly summaries
//! - [`service`] is the boundary the HTTP [`routes`] are built on

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod routes;
pub mod schema;
pub mod service;
pub mod source;
pub mod store;
pub mod tracker;
pub mod units;

pub use config::Config;
pub use error::WeatherError;
pub use models::{Alert, AlertType, Reading, Threshold};
pub use service::WeatherService;
pub use units::Unit;
