//! Consecutive-breach alert tracking.
//!
//! Every city owns a small state machine ([`BreachState`]) that counts
//! same-direction threshold breaches arriving within the consecutiveness
//! window. An alert fires only once the streak reaches the configured count,
//! after which the streak restarts. An isolated spike never alerts, and a
//! sustained excursion alerts once per `breach_threshold` readings instead of
//! once per reading.
//!
//! # Concurrency
//! [`AlertTracker`] keeps one async mutex per city in a [`DashMap`], so
//! readings for the same city are processed one at a time while different
//! cities never contend. A process-wide gate lets [`AlertTracker::exclusive`]
//! wait for all in-flight readings before an administrative wipe.
//!
//! State is process-local and is lost on restart.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::models::{Alert, AlertType, Reading, Threshold, DEFAULT_MAX_CELSIUS};

pub const DEFAULT_CONSECUTIVE_WINDOW_SECS: i64 = 600;
pub const DEFAULT_BREACH_THRESHOLD: u32 = 2;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Largest gap between two readings that still counts as consecutive.
    pub consecutive_window_secs: i64,
    /// Streak length that fires an alert. Values below 1 behave as 1.
    pub breach_threshold: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            consecutive_window_secs: DEFAULT_CONSECUTIVE_WINDOW_SECS,
            breach_threshold: DEFAULT_BREACH_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakKind {
    #[default]
    None,
    Low,
    High,
}

/// Where a temperature falls relative to the active bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Within,
    Low,
    High,
}

/// Bounds a reading is classified against: a user threshold, or the
/// default policy (no low bound, high above 35 °C).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveBounds {
    pub min_celsius: Option<f64>,
    pub max_celsius: f64,
}

impl ActiveBounds {
    // ---
    pub fn from_threshold(threshold: Option<&Threshold>) -> Self {
        match threshold {
            Some(t) => ActiveBounds {
                min_celsius: Some(t.min_celsius),
                max_celsius: t.max_celsius,
            },
            None => ActiveBounds {
                min_celsius: None,
                max_celsius: DEFAULT_MAX_CELSIUS,
            },
        }
    }

    pub fn classify(&self, celsius: f64) -> Classification {
        // ---
        match self.min_celsius {
            Some(min) if celsius < min => Classification::Low,
            _ if celsius > self.max_celsius => Classification::High,
            _ => Classification::Within,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BreachState {
    pub streak_count: u32,
    pub streak_kind: StreakKind,
    pub last_observed_at: Option<i64>,
}

impl BreachState {
    // ---
    /// True when `observed_at` is not newer than the last reading this state
    /// accepted. A repeated timestamp is the same observation fetched twice.
    pub fn is_stale(&self, observed_at: i64) -> bool {
        self.last_observed_at.is_some_and(|last| observed_at <= last)
    }

    fn reset_streak(&mut self) {
        self.streak_count = 0;
        self.streak_kind = StreakKind::None;
    }

    /// Advance the state machine with one reading and return the alert it
    /// fires, if any.
    ///
    /// The caller is responsible for having validated the reading and for
    /// serializing calls per city.
    pub fn observe(&mut self, reading: &Reading, bounds: &ActiveBounds, config: &TrackerConfig) -> Option<Alert> {
        // ---
        let t = reading.observed_at;
        let is_consecutive = self
            .last_observed_at
            .is_some_and(|last| t - last <= config.consecutive_window_secs);

        if !is_consecutive {
            self.reset_streak();
        }

        let kind = match bounds.classify(reading.temperature_celsius) {
            Classification::Within => None,
            Classification::Low => Some(StreakKind::Low),
            Classification::High => Some(StreakKind::High),
        };

        match kind {
            Some(kind) if kind == self.streak_kind && is_consecutive => self.streak_count += 1,
            Some(kind) => {
                self.streak_count = 1;
                self.streak_kind = kind;
            }
            None => self.reset_streak(),
        }

        self.last_observed_at = Some(t);

        if self.streak_count < config.breach_threshold.max(1) {
            return None;
        }

        let alert = build_alert(reading, self.streak_kind, self.streak_count, bounds);
        self.reset_streak();
        Some(alert)
    }
}

fn build_alert(reading: &Reading, kind: StreakKind, streak: u32, bounds: &ActiveBounds) -> Alert {
    // ---
    let (alert_type, message) = match kind {
        StreakKind::Low => (
            AlertType::ConsecutiveLowTemperature,
            format!(
                "Temperature stayed below {:.2}°C for {} consecutive readings (latest {:.2}°C)",
                bounds.min_celsius.unwrap_or(f64::NEG_INFINITY),
                streak,
                reading.temperature_celsius
            ),
        ),
        // `observe` only builds alerts for a live streak.
        StreakKind::High | StreakKind::None => (
            AlertType::ConsecutiveHighTemperature,
            format!(
                "Temperature stayed above {:.2}°C for {} consecutive readings (latest {:.2}°C)",
                bounds.max_celsius, streak, reading.temperature_celsius
            ),
        ),
    };

    Alert {
        city: reading.city.clone(),
        alert_type,
        message,
        observed_at: reading.observed_at,
    }
}

/// Exclusive access to one city's [`BreachState`] while a reading is
/// processed. Holding it also keeps administrative wipes out.
pub struct CityGuard {
    state: OwnedMutexGuard<BreachState>,
    _gate: OwnedRwLockReadGuard<()>,
}

impl Deref for CityGuard {
    type Target = BreachState;

    fn deref(&self) -> &BreachState {
        &self.state
    }
}

impl DerefMut for CityGuard {
    fn deref_mut(&mut self) -> &mut BreachState {
        &mut self.state
    }
}

/// Owner of every city's breach state.
#[derive(Debug)]
pub struct AlertTracker {
    config: TrackerConfig,
    states: DashMap<String, Arc<Mutex<BreachState>>>,
    gate: Arc<RwLock<()>>,
}

impl AlertTracker {
    // ---
    pub fn new(config: TrackerConfig) -> Self {
        AlertTracker {
            config,
            states: DashMap::new(),
            gate: Arc::new(RwLock::new(())),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Lock `city`'s state, creating it on first use.
    pub async fn lock(&self, city: &str) -> CityGuard {
        // ---
        let gate = Arc::clone(&self.gate).read_owned().await;

        // Clone the cell out so no map shard lock is held across the await.
        let cell = Arc::clone(self.states.entry(city.to_string()).or_default().value());
        CityGuard {
            state: cell.lock_owned().await,
            _gate: gate,
        }
    }

    /// Snapshot of `city`'s state, if the city has been seen.
    pub async fn state(&self, city: &str) -> Option<BreachState> {
        // ---
        let cell = self.states.get(city).map(|c| Arc::clone(c.value()))?;
        let state = cell.lock().await.clone();
        Some(state)
    }

    /// Wait for every in-flight reading to finish and block new ones until
    /// the returned guard is dropped.
    pub async fn exclusive(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.gate).write_owned().await
    }

    /// Forget every city's streak.
    pub fn reset(&self) {
        // ---
        let cities = self.states.len();
        self.states.clear();
        tracing::info!("Breach state reset for {} cities", cities);
    }
}
