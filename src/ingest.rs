//! Scheduled ingestion: fetch, normalize, store and evaluate every city.
//!
//! A pass visits every configured city with bounded fan-out. One city's
//! failure never aborts the pass; each city yields a typed outcome and the
//! pass returns them as a [`PassReport`]. The loop stops on a `watch`
//! shutdown signal, checked between passes and before each city starts, so a
//! write is never interrupted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::{Result, WeatherError};
use crate::models::{Alert, Reading};
use crate::source::WeatherSource;
use crate::store::Store;
use crate::tracker::{ActiveBounds, AlertTracker, BreachState};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// ---

#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    pub interval: Duration,
    /// Cities fetched at once within a pass.
    pub concurrency: usize,
    pub fetch_timeout: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        IngestSettings {
            interval: DEFAULT_INTERVAL,
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// What happened to one reading that reached the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    /// Stored and evaluated; `alert` is set when the reading completed a
    /// breach streak.
    Stored { reading: Reading, alert: Option<Alert> },
    /// Not newer than the last reading evaluated for the city, either out of
    /// order or the same observation fetched again.
    Stale(Reading),
}

impl Ingested {
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            Ingested::Stored { alert, .. } => alert.as_ref(),
            Ingested::Stale(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct CityOutcome {
    pub city: String,
    pub result: Result<Ingested>,
}

/// Per-city outcomes of one pass, in configured city order.
#[derive(Debug, Default)]
pub struct PassReport {
    pub outcomes: Vec<CityOutcome>,
    /// Set when shutdown stopped the pass before every city was visited.
    pub interrupted: bool,
}

impl PassReport {
    // ---
    pub fn succeeded(&self) -> impl Iterator<Item = &CityOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &CityOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().and_then(Ingested::alert))
    }

    /// Readings that were stored during the pass.
    pub fn readings(&self) -> impl Iterator<Item = &Reading> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(Ingested::Stored { reading, .. }) => Some(reading),
            _ => None,
        })
    }

    pub fn log_summary(&self) {
        info!(
            "Ingestion pass complete: {} ok, {} failed, {} alerts{}",
            self.succeeded().count(),
            self.failed().count(),
            self.alerts().count(),
            if self.interrupted { " (interrupted)" } else { "" }
        );
    }
}

/// Store `reading` and run it through `city`'s breach state machine.
///
/// The city's tracker lock is held from the staleness check through the
/// alert write, so readings for one city are stored and evaluated strictly
/// in order. Malformed readings are rejected before any state is touched.
///
/// The reading is evaluated against a copy of the city's state, and the copy
/// replaces the state only once the reading and any alert are persisted. A
/// failed write leaves the streak as it was.
pub async fn ingest_reading<S: Store>(
    store: &S,
    tracker: &AlertTracker,
    reading: Reading,
) -> Result<Ingested> {
    // ---
    reading.validate()?;

    let mut state = tracker.lock(&reading.city).await;
    if state.is_stale(reading.observed_at) {
        return Ok(Ingested::Stale(reading));
    }

    let threshold = store.threshold(&reading.city).await?;
    let bounds = ActiveBounds::from_threshold(threshold.as_ref());
    let mut next: BreachState = (*state).clone();
    let alert = next.observe(&reading, &bounds, tracker.config());

    store.append_reading(&reading).await?;
    if let Some(alert) = &alert {
        store.append_alert(alert).await?;
    }
    *state = next;

    Ok(Ingested::Stored { reading, alert })
}

/// Drives the pipeline for the configured cities.
#[derive(Debug, Clone)]
pub struct Ingestor<S, W> {
    store: S,
    source: W,
    tracker: Arc<AlertTracker>,
    cities: Arc<Vec<String>>,
    settings: IngestSettings,
}

impl<S: Store, W: WeatherSource> Ingestor<S, W> {
    // ---
    pub fn new(
        store: S,
        source: W,
        tracker: Arc<AlertTracker>,
        cities: Vec<String>,
        settings: IngestSettings,
    ) -> Self {
        Ingestor {
            store,
            source,
            tracker,
            cities: Arc::new(cities),
            settings,
        }
    }

    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    pub fn tracker(&self) -> &AlertTracker {
        &self.tracker
    }

    /// Fetch one city with the configured timeout and ingest the result.
    pub async fn ingest_city(&self, city: &str) -> Result<Ingested> {
        // ---
        let reading = tokio::time::timeout(self.settings.fetch_timeout, self.source.fetch(city))
            .await
            .map_err(|_| WeatherError::UpstreamFetch {
                city: city.to_string(),
                reason: format!("timed out after {:?}", self.settings.fetch_timeout),
            })??;

        ingest_reading(&self.store, &self.tracker, reading).await
    }

    /// Visit every city once. When `shutdown` is given and fires, cities not
    /// yet started are skipped; started ones finish.
    pub async fn run_pass(&self, shutdown: Option<&watch::Receiver<bool>>) -> PassReport {
        // ---
        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut interrupted = false;

        for (index, city) in self.cities.iter().enumerate() {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                interrupted = true;
                break;
            }
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };

            let this = self.clone();
            let city = city.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = this.ingest_city(&city).await;
                log_outcome(&city, &result);
                (index, CityOutcome { city, result })
            });
        }

        let mut outcomes = Vec::with_capacity(self.cities.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Ingestion task failed: {}", e),
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        PassReport {
            outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
            interrupted,
        }
    }

    /// Run passes every `interval` until `shutdown` flips to `true` or its
    /// sender is dropped. The first pass starts immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        // ---
        info!(
            "Ingestion loop started: {} cities every {:?}",
            self.cities.len(),
            self.settings.interval
        );

        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_pass(Some(&shutdown)).await;
            report.log_summary();
        }

        info!("Ingestion loop stopped");
    }
}

fn log_outcome(city: &str, result: &Result<Ingested>) {
    // ---
    match result {
        Ok(Ingested::Stored { reading, alert }) => {
            debug!(
                "Stored reading for {}: {:.2}°C {} at {}",
                city, reading.temperature_celsius, reading.condition, reading.observed_at
            );
            if let Some(alert) = alert {
                warn!("{} alert for {}: {}", alert.alert_type, city, alert.message);
            }
        }
        Ok(Ingested::Stale(reading)) => {
            debug!(
                "Skipping stale reading for {} observed at {}",
                city, reading.observed_at
            );
        }
        Err(e @ WeatherError::Store(_)) => error!("Skipping {}: {}", city, e),
        Err(e) => warn!("Skipping {}: {}", city, e),
    }
}
