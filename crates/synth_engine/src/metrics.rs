//! Meter seam and in-memory instruments.
//!
//! Mirrors the instrument surface an external meter provider would expose:
//! monotonic counters and histograms, keyed by instrument name plus a small
//! attribute set. The in-memory implementation aggregates series for tests
//! and end-of-run summaries.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// A monotonic integer counter.
pub trait Counter: Send + Sync {
    /// Adds `value` to the series selected by `attributes`.
    fn add(&self, value: u64, attributes: &[(&str, &str)]);
}

/// A floating-point histogram.
pub trait Histogram: Send + Sync {
    /// Records one observation into the series selected by `attributes`.
    fn record(&self, value: f64, attributes: &[(&str, &str)]);
}

/// Creates instruments under one instrumentation scope.
pub trait Meter: Send + Sync {
    /// Creates (or fetches) a monotonic `u64` counter.
    fn u64_counter(&self, name: &str) -> Arc<dyn Counter>;

    /// Creates (or fetches) an `f64` histogram with a unit annotation.
    fn f64_histogram(&self, name: &str, unit: &str) -> Arc<dyn Histogram>;
}

/// Hands out meters keyed by instrumentation scope.
pub trait MeterProvider: Send + Sync {
    /// Returns the meter for `scope`.
    fn meter(&self, scope: &str) -> Arc<dyn Meter>;
}

/// Identity of one metric series: instrument name plus sorted attributes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SeriesKey {
    /// Instrument name.
    pub name: String,
    /// Attribute pairs in sorted order.
    pub attributes: Vec<(String, String)>,
}

fn series_key(name: &str, attributes: &[(&str, &str)]) -> SeriesKey {
    let mut attrs: Vec<(String, String)> = attributes
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect();
    attrs.sort();
    SeriesKey {
        name: name.to_string(),
        attributes: attrs,
    }
}

/// Aggregated state of one histogram series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramData {
    /// Number of observations.
    pub count: u64,
    /// Sum of all observations.
    pub sum: f64,
    /// Smallest observation.
    pub min: f64,
    /// Largest observation.
    pub max: f64,
}

impl HistogramData {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    /// Returns the mean observation, or zero when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Debug, Default)]
struct MetricStore {
    counters: Mutex<BTreeMap<SeriesKey, u64>>,
    histograms: Mutex<BTreeMap<SeriesKey, HistogramData>>,
}

/// Aggregates every instrument write in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMeterProvider {
    store: Arc<MetricStore>,
}

impl InMemoryMeterProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns one counter series, or zero when never written.
    #[must_use]
    pub fn counter_value(&self, name: &str, attributes: &[(&str, &str)]) -> u64 {
        self.store
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&series_key(name, attributes))
            .copied()
            .unwrap_or(0)
    }

    /// Returns the sum of all series of a counter.
    #[must_use]
    pub fn counter_total(&self, name: &str) -> u64 {
        self.store
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key.name == name)
            .map(|(_, value)| value)
            .sum()
    }

    /// Returns one histogram series, if it was ever written.
    #[must_use]
    pub fn histogram_data(&self, name: &str, attributes: &[(&str, &str)]) -> Option<HistogramData> {
        self.store
            .histograms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&series_key(name, attributes))
            .copied()
    }

    /// Returns the total observation count across all series of a
    /// histogram.
    #[must_use]
    pub fn histogram_count(&self, name: &str) -> u64 {
        self.store
            .histograms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| key.name == name)
            .map(|(_, data)| data.count)
            .sum()
    }
}

impl MeterProvider for InMemoryMeterProvider {
    fn meter(&self, _scope: &str) -> Arc<dyn Meter> {
        Arc::new(InMemoryMeter {
            store: Arc::clone(&self.store),
        })
    }
}

struct InMemoryMeter {
    store: Arc<MetricStore>,
}

impl Meter for InMemoryMeter {
    fn u64_counter(&self, name: &str) -> Arc<dyn Counter> {
        Arc::new(InMemoryCounter {
            name: name.to_string(),
            store: Arc::clone(&self.store),
        })
    }

    fn f64_histogram(&self, name: &str, _unit: &str) -> Arc<dyn Histogram> {
        Arc::new(InMemoryHistogram {
            name: name.to_string(),
            store: Arc::clone(&self.store),
        })
    }
}

struct InMemoryCounter {
    name: String,
    store: Arc<MetricStore>,
}

impl Counter for InMemoryCounter {
    fn add(&self, value: u64, attributes: &[(&str, &str)]) {
        let mut counters = self
            .store
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *counters.entry(series_key(&self.name, attributes)).or_insert(0) += value;
    }
}

struct InMemoryHistogram {
    name: String,
    store: Arc<MetricStore>,
}

impl Histogram for InMemoryHistogram {
    fn record(&self, value: f64, attributes: &[(&str, &str)]) {
        let mut histograms = self
            .store
            .histograms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        histograms
            .entry(series_key(&self.name, attributes))
            .or_default()
            .record(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_attribute_set() {
        let provider = InMemoryMeterProvider::new();
        let meter = provider.meter("synth");
        let counter = meter.u64_counter("requests");

        counter.add(1, &[("service.name", "gateway")]);
        counter.add(2, &[("service.name", "gateway")]);
        counter.add(5, &[("service.name", "backend")]);

        assert_eq!(provider.counter_value("requests", &[("service.name", "gateway")]), 3);
        assert_eq!(provider.counter_value("requests", &[("service.name", "backend")]), 5);
        assert_eq!(provider.counter_total("requests"), 8);
        assert_eq!(provider.counter_value("requests", &[("service.name", "missing")]), 0);
    }

    #[test]
    fn attribute_order_does_not_split_series() {
        let provider = InMemoryMeterProvider::new();
        let counter = provider.meter("synth").u64_counter("requests");

        counter.add(1, &[("a", "1"), ("b", "2")]);
        counter.add(1, &[("b", "2"), ("a", "1")]);

        assert_eq!(provider.counter_value("requests", &[("a", "1"), ("b", "2")]), 2);
    }

    #[test]
    fn histograms_track_count_sum_and_extremes() {
        let provider = InMemoryMeterProvider::new();
        let histogram = provider.meter("synth").f64_histogram("latency", "ms");

        histogram.record(2.0, &[("op", "list")]);
        histogram.record(6.0, &[("op", "list")]);

        let data = provider.histogram_data("latency", &[("op", "list")]).unwrap();
        assert_eq!(data.count, 2);
        assert!((data.sum - 8.0).abs() < f64::EPSILON);
        assert!((data.min - 2.0).abs() < f64::EPSILON);
        assert!((data.max - 6.0).abs() < f64::EPSILON);
        assert!((data.mean() - 4.0).abs() < f64::EPSILON);
        assert_eq!(provider.histogram_count("latency"), 2);
    }
}
