//! Application entry point for the `weatherwatch` service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the store: PostgreSQL when `DATABASE_URL` is set (schema created
//!   if missing), otherwise an in-memory store
//! - Spawning the periodic ingestion loop
//! - Mounting all API routes via the `routes` gateway
//! - Serving HTTP until Ctrl-C, then stopping the ingestion loop cleanly
//!
//! # Environment Variables
//! - `OPENWEATHER_API_KEY` (**required**) – provider API key
//! - `DATABASE_URL` (optional) – PostgreSQL connection string
//! - `WEATHER_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `WEATHER_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See [`weatherwatch::config`] for the full list.
use std::env;

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

use weatherwatch::source::OpenWeatherClient;
use weatherwatch::store::{MemoryStore, PgStore, Store};
use weatherwatch::{config, routes, schema, Config, WeatherService};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    match cfg.db_url.clone() {
        Some(db_url) => {
            tracing::info!("Attempting to connect to database");

            let pool = PgPoolOptions::new()
                .max_connections(cfg.db_pool_max)
                .connect(&db_url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

            tracing::info!("Successfully connected to database");
            schema::create_schema(&pool).await?;

            serve(cfg, PgStore::new(pool)).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data will not survive a restart");
            serve(cfg, MemoryStore::new()).await
        }
    }
}

/// Run the ingestion loop and the HTTP server on `store` until Ctrl-C.
async fn serve<S: Store>(cfg: Config, store: S) -> Result<()> {
    // ---
    let source = OpenWeatherClient::new(cfg.openweather_settings())?;
    let service = WeatherService::new(
        store,
        source,
        cfg.cities.clone(),
        cfg.tracker_config(),
        cfg.ingest_settings(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingest = tokio::spawn(service.ingestor().run(shutdown_rx));

    // Build app from routes gateway
    let app: Router = routes::router(service);

    tracing::info!("Listening on {}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, waiting for ingestion loop");
    shutdown_tx.send_replace(true);
    ingest.await?;

    Ok(())
}

async fn shutdown_signal() {
    // ---
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `WEATHER_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, or else `WEATHER_LOG_LEVEL`
///
/// This should be called once at application startup before any logging
/// or tracing macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("WEATHER_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to WEATHER_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("WEATHER_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=info,reqwest=info"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
