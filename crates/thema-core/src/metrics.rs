//! In-process metrics registry (§4.B).
//!
//! Plain `Mutex`-guarded maps rather than a metrics crate — the teacher's
//! `EventBus` takes the same "no external dependency for something this
//! small" stance, and the spec only asks for a JSON-serializable snapshot,
//! not wire-format Prometheus export.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

use crate::traits::MetricsRegistry;

fn label_key(labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let mut sorted: Vec<&(&str, &str)> = labels.iter().collect();
    sorted.sort_by_key(|(k, _)| *k);
    sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, Serialize)]
struct HistogramSnapshot {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    avg: f64,
}

#[derive(Debug, Default)]
struct Histogram {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Histogram {
    fn observe(&mut self, value: f64) {
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

    fn snapshot(&self) -> HistogramSnapshot {
        let avg = if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        };
        HistogramSnapshot {
            count: self.count,
            sum: self.sum,
            min: self.min,
            max: self.max,
            avg,
        }
    }
}

/// Default in-process [`MetricsRegistry`] implementation, one instance
/// shared process-wide via `Arc`.
#[derive(Default)]
pub struct InProcessMetrics {
    counters: Mutex<HashMap<(String, String), u64>>,
    histograms: Mutex<HashMap<(String, String), Histogram>>,
}

impl InProcessMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsRegistry for InProcessMetrics {
    fn incr_counter(&self, name: &str, labels: &[(&str, &str)], by: u64) {
        let key = (name.to_string(), label_key(labels));
        let mut counters = self.counters.lock().expect("metrics mutex poisoned");
        *counters.entry(key).or_insert(0) += by;
    }

    fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], value_ms: f64) {
        let key = (name.to_string(), label_key(labels));
        let mut histograms = self.histograms.lock().expect("metrics mutex poisoned");
        histograms.entry(key).or_default().observe(value_ms);
    }

    fn export_snapshot(&self) -> serde_json::Value {
        let counters = self.counters.lock().expect("metrics mutex poisoned");
        let histograms = self.histograms.lock().expect("metrics mutex poisoned");

        let counters_json: serde_json::Map<String, serde_json::Value> = counters
            .iter()
            .map(|((name, labels), value)| {
                let key = if labels.is_empty() {
                    name.clone()
                } else {
                    format!("{name}{{{labels}}}")
                };
                (key, serde_json::json!(value))
            })
            .collect();

        let histograms_json: serde_json::Map<String, serde_json::Value> = histograms
            .iter()
            .map(|((name, labels), histogram)| {
                let key = if labels.is_empty() {
                    name.clone()
                } else {
                    format!("{name}{{{labels}}}")
                };
                (key, serde_json::json!(histogram.snapshot()))
            })
            .collect();

        serde_json::json!({
            "counters": counters_json,
            "histograms": histograms_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_per_label_set() {
        let metrics = InProcessMetrics::new();
        metrics.incr_counter("preference_query_total", &[("query_type", "stats"), ("success", "true")], 1);
        metrics.incr_counter("preference_query_total", &[("query_type", "stats"), ("success", "true")], 2);
        metrics.incr_counter("preference_query_total", &[("query_type", "jobs"), ("success", "false")], 1);

        let snapshot = metrics.export_snapshot();
        let counters = snapshot.get("counters").unwrap().as_object().unwrap();
        assert_eq!(counters.len(), 2);
        let total: u64 = counters.values().map(|v| v.as_u64().unwrap()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn histogram_tracks_min_max_avg() {
        let metrics = InProcessMetrics::new();
        metrics.observe_histogram("vector_search_query_ms", &[], 10.0);
        metrics.observe_histogram("vector_search_query_ms", &[], 30.0);
        metrics.observe_histogram("vector_search_query_ms", &[], 20.0);

        let snapshot = metrics.export_snapshot();
        let histograms = snapshot.get("histograms").unwrap().as_object().unwrap();
        let entry = histograms.get("vector_search_query_ms").unwrap();
        assert_eq!(entry["count"], 3);
        assert_eq!(entry["min"], 10.0);
        assert_eq!(entry["max"], 30.0);
        assert_eq!(entry["avg"], 20.0);
    }

    #[test]
    fn label_key_order_independent() {
        assert_eq!(
            label_key(&[("a", "1"), ("b", "2")]),
            label_key(&[("b", "2"), ("a", "1")])
        );
    }
}
