//! Counters emitted by the executor.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

pub const SUCCESSFUL_CHASING_ACTION: &str = "successful_chasing_action";
pub const FAILED_CHASING_ACTION: &str = "failed_chasing_action";

pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &str, value: u64, tags: &[(&'static str, String)]);
}

/// Forwards to whatever recorder the `metrics` crate has installed.
#[derive(Debug, Default)]
pub struct MetricsCrateSink;

impl MetricsSink for MetricsCrateSink {
    fn increment(&self, name: &str, value: u64, tags: &[(&'static str, String)]) {
        let labels: Vec<metrics::Label> = tags
            .iter()
            .map(|(key, value)| metrics::Label::new(*key, value.clone()))
            .collect();
        metrics::counter!(name.to_string(), labels).increment(value);
    }
}

/// Keeps counts in memory, keyed by name plus sorted tags.
#[derive(Debug, Default)]
pub struct RecordingMetricsSink {
    counts: Mutex<HashMap<String, u64>>,
}

impl RecordingMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(name: &str, tags: &[(&str, String)]) -> String {
        let mut parts: Vec<String> = tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        parts.sort();
        if parts.is_empty() {
            name.to_string()
        } else {
            format!("{name}{{{}}}", parts.join(","))
        }
    }

    fn counts(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count for an exact name and tag set.
    pub fn count(&self, name: &str, tags: &[(&str, String)]) -> u64 {
        let key = Self::key(name, tags);
        self.counts().get(&key).copied().unwrap_or(0)
    }

    /// Sum over every tag set recorded under `name`.
    pub fn total(&self, name: &str) -> u64 {
        let prefix = format!("{name}{{");
        let counts = self.counts();
        counts
            .iter()
            .filter(|(k, _)| k.as_str() == name || k.starts_with(&prefix))
            .map(|(_, v)| *v)
            .sum()
    }
}

impl MetricsSink for RecordingMetricsSink {
    fn increment(&self, name: &str, value: u64, tags: &[(&'static str, String)]) {
        let key = Self::key(name, tags);
        *self.counts().entry(key).or_insert(0) += value;
    }
}
