//! Runtime statistics counters.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

/// Named counters updated by operations and read by `statisticsGet`.
#[derive(Debug, Default)]
pub struct Statistics {
    counters: Mutex<BTreeMap<String, u64>>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: &str, by: u64) {
        match self.counters.lock() {
            Ok(mut counters) => *counters.entry(name.to_string()).or_insert(0) += by,
            Err(e) => tracing::warn!(error = %e, "Failed to acquire statistics lock"),
        }
    }

    /// Add a duration to the `<name>.millis` counter.
    pub fn record_duration(&self, name: &str, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.increment(&format!("{}.millis", name), millis);
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters.lock().ok().and_then(|c| c.get(name).copied())
    }

    /// Counters whose name matches `filter`, sorted by name.
    pub fn snapshot(&self, filter: Option<&Regex>) -> Vec<(String, u64)> {
        let Ok(counters) = self.counters.lock() else {
            return Vec::new();
        };
        counters
            .iter()
            .filter(|(name, _)| filter.map_or(true, |re| re.is_match(name)))
            .map(|(name, value)| (name.clone(), *value))
            .collect()
    }

    pub fn reset(&self) {
        if let Ok(mut counters) = self.counters.lock() {
            counters.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_filter() {
        let stats = Statistics::new();
        stats.increment("operations.executed", 1);
        stats.increment("operations.executed", 2);
        stats.increment("instances.added", 1);
        stats.record_duration("operations", Duration::from_millis(12));

        assert_eq!(stats.get("operations.executed"), Some(3));
        assert_eq!(stats.get("operations.millis"), Some(12));

        let re = Regex::new("^operations\\.").unwrap();
        let names: Vec<String> = stats.snapshot(Some(&re)).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["operations.executed", "operations.millis"]);
        assert_eq!(stats.snapshot(None).len(), 3);

        stats.reset();
        assert!(stats.snapshot(None).is_empty());
    }
}
