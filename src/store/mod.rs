//! Persistence seams for readings, thresholds and alerts.
//!
//! Three narrow traits model the three logical stores. Both backends
//! implement all of them, and [`Store`] bundles them for the components
//! that need every store plus the administrative wipe.
//!
//! Time ranges are half-open on the right: `from <= observed_at < to`.

use std::future::Future;

use crate::error::Result;
use crate::models::{Alert, Reading, Threshold};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ---

/// Append-only log of Celsius readings per city.
pub trait ReadingStore: Send + Sync {
    // ---
    fn append_reading(&self, reading: &Reading) -> impl Future<Output = Result<()>> + Send;

    /// Readings for `city` in `[from, to)`, oldest first.
    fn readings_between(
        &self,
        city: &str,
        from: i64,
        to: i64,
    ) -> impl Future<Output = Result<Vec<Reading>>> + Send;
}

/// City keyed upsertable bounds.
pub trait ThresholdStore: Send + Sync {
    // ---
    /// Insert or overwrite the bounds for `threshold.city`. Fails with
    /// `Validation` when min > max.
    fn upsert_threshold(&self, threshold: &Threshold) -> impl Future<Output = Result<()>> + Send;

    fn threshold(&self, city: &str) -> impl Future<Output = Result<Option<Threshold>>> + Send;
}

/// Append-only alert log.
pub trait AlertStore: Send + Sync {
    // ---
    fn append_alert(&self, alert: &Alert) -> impl Future<Output = Result<()>> + Send;

    /// Alerts for `city` observed at or after `since`, newest first, at most
    /// `limit` entries.
    fn alerts_since(
        &self,
        city: &str,
        since: i64,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Alert>>> + Send;
}

/// Every store the service needs, plus the administrative wipe.
pub trait Store: ReadingStore + ThresholdStore + AlertStore + Clone + 'static {
    // ---
    /// Remove all readings, alerts and thresholds.
    fn clear_all(&self) -> impl Future<Output = Result<()>> + Send;
}
