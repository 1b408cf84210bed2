//! Process-wide named instance store.
//!
//! One mutex guards the whole map; there are no per-key transactions, so
//! scripts that mutate the same name concurrently must coordinate
//! themselves.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::CommandError;
use crate::runtime::Value;

#[derive(Debug, Default)]
pub struct InstanceStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Value>>, CommandError> {
        self.values
            .lock()
            .map_err(|e| CommandError::IllegalState(format!("Failed to acquire instance store lock: {}", e)))
    }

    /// Add an instance; fails if the name is taken.
    pub fn add(&self, name: &str, value: Value) -> Result<(), CommandError> {
        let mut values = self.lock()?;
        if values.contains_key(name) {
            return Err(CommandError::IllegalArgument(format!(
                "Named instance '{}' already exists",
                name
            )));
        }
        values.insert(name.to_string(), value);
        tracing::debug!(name = %name, "Named instance added");
        Ok(())
    }

    /// Create or overwrite an instance, returning the previous value.
    pub fn replace(&self, name: &str, value: Value) -> Result<Option<Value>, CommandError> {
        let previous = self.lock()?.insert(name.to_string(), value);
        tracing::debug!(name = %name, replaced = previous.is_some(), "Named instance replaced");
        Ok(previous)
    }

    /// Remove an instance. The caller runs its close hook.
    pub fn remove(&self, name: &str) -> Result<Value, CommandError> {
        self.lock()?
            .remove(name)
            .ok_or_else(|| CommandError::NotFound(format!("named instance '{}'", name)))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().ok().and_then(|values| values.get(name).cloned())
    }

    /// Get an instance or fail with `NotFound`.
    pub fn require(&self, name: &str) -> Result<Value, CommandError> {
        self.get(name)
            .ok_or_else(|| CommandError::NotFound(format!("named instance '{}'", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock()
            .map(|values| values.contains_key(name))
            .unwrap_or(false)
    }

    /// Names and values, sorted by name.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.lock()
            .map(|values| values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|values| values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_duplicates() {
        let store = InstanceStore::new();
        store.add("a", Value::Int(1)).unwrap();
        let err = store.add("a", Value::Int(2)).unwrap_err();
        assert!(matches!(err, CommandError::IllegalArgument(_)));
        assert_eq!(store.get("a").and_then(|v| v.as_int()), Some(1));
    }

    #[test]
    fn test_replace_and_remove() {
        let store = InstanceStore::new();
        assert!(store.replace("a", Value::Int(1)).unwrap().is_none());
        let previous = store.replace("a", Value::Int(2)).unwrap();
        assert_eq!(previous.and_then(|v| v.as_int()), Some(1));

        assert_eq!(store.remove("a").unwrap().as_int(), Some(2));
        assert!(matches!(store.remove("a"), Err(CommandError::NotFound(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_entries_sorted() {
        let store = InstanceStore::new();
        store.add("b", Value::Null).unwrap();
        store.add("a", Value::Null).unwrap();
        let names: Vec<String> = store.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(store.contains("a"));
        assert!(store.require("c").is_err());
    }
}
