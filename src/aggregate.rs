//! Daily and monthly summaries over stored readings.
//!
//! Stateless: callers load readings from the [`ReadingStore`] and the
//! summaries are computed here. All values stay Celsius until the final
//! conversion to the requested unit, rounded to two decimals.
//!
//! Day boundaries come from the time zone of the `now` passed in, so the
//! service uses local time while tests pin a fixed zone.
//!
//! [`ReadingStore`]: crate::store::ReadingStore

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike};
use serde::Serialize;

use crate::error::{Result, WeatherError};
use crate::models::Reading;
use crate::units::{self, Unit};

/// Days covered by [`monthly_summary`].
pub const MONTHLY_WINDOW_DAYS: i64 = 30;

// ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    // ---
    pub city: String,
    pub date: NaiveDate,
    pub avg_temperature: f64,
    pub max_temperature: f64,
    pub min_temperature: f64,
    pub dominant_condition: String,
    pub reading_count: usize,
    pub unit: Unit,
}

/// Epoch seconds of local midnight starting `now`'s day.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    // ---
    let midnight = now.date_naive().and_time(NaiveTime::MIN);

    // Midnight can be skipped by a DST transition; fall back to the wall
    // clock offset from `now`.
    now.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| now.timestamp() - i64::from(now.time().num_seconds_from_midnight()))
}

/// Most frequent condition; ties go to the one seen first.
pub fn dominant_condition<'a, I>(conditions: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    // ---
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for c in conditions {
        let n = counts.entry(c).or_insert(0);
        if *n == 0 {
            order.push(c);
        }
        *n += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for c in order {
        let n = counts[c];
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((c, n));
        }
    }
    best.map(|(c, _)| c.to_string())
}

/// Summarize a non-empty set of readings for one day.
fn summarize(city: &str, date: NaiveDate, readings: &[&Reading], unit: Unit) -> Option<DailySummary> {
    // ---
    let first = readings.first()?;
    let mut sum = 0.0;
    let mut max = first.temperature_celsius;
    let mut min = first.temperature_celsius;
    for r in readings {
        sum += r.temperature_celsius;
        max = max.max(r.temperature_celsius);
        min = min.min(r.temperature_celsius);
    }
    let avg = sum / readings.len() as f64;

    let display = |c: f64| units::round2(units::from_celsius(c, unit));

    Some(DailySummary {
        city: city.to_string(),
        date,
        avg_temperature: display(avg),
        max_temperature: display(max),
        min_temperature: display(min),
        dominant_condition: dominant_condition(readings.iter().map(|r| r.condition.as_str()))?,
        reading_count: readings.len(),
        unit,
    })
}

/// Summary of today's readings (`observed_at` at or after local midnight).
///
/// Fails with `NotFound` when `city` has no readings today.
pub fn daily_summary<Tz: TimeZone>(
    city: &str,
    readings: &[Reading],
    unit: Unit,
    now: &DateTime<Tz>,
) -> Result<DailySummary> {
    // ---
    let since = start_of_day(now);
    let today: Vec<&Reading> = readings
        .iter()
        .filter(|r| r.city == city && r.observed_at >= since)
        .collect();

    summarize(city, now.date_naive(), &today, unit)
        .ok_or_else(|| WeatherError::NotFound(format!("no readings for {} today", city)))
}

/// Per-day summaries over the trailing [`MONTHLY_WINDOW_DAYS`] days,
/// oldest day first. Days without readings are omitted.
pub fn monthly_summary<Tz: TimeZone>(
    city: &str,
    readings: &[Reading],
    unit: Unit,
    now: &DateTime<Tz>,
) -> Vec<DailySummary> {
    // ---
    let (from, to) = monthly_window(now);
    let tz = now.timezone();

    let mut days: BTreeMap<NaiveDate, Vec<&Reading>> = BTreeMap::new();
    for r in readings
        .iter()
        .filter(|r| r.city == city && r.observed_at >= from && r.observed_at < to)
    {
        if let Some(at) = tz.timestamp_opt(r.observed_at, 0).single() {
            days.entry(at.date_naive()).or_default().push(r);
        }
    }

    days.iter()
        .filter_map(|(date, day)| summarize(city, *date, day, unit))
        .collect()
}

/// `[from, to)` epoch range covered by [`monthly_summary`].
pub fn monthly_window<Tz: TimeZone>(now: &DateTime<Tz>) -> (i64, i64) {
    let to = now.timestamp() + 1;
    let from = (now.clone() - Duration::days(MONTHLY_WINDOW_DAYS)).timestamp();
    (from, to)
}
