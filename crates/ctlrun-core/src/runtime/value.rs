//! Values produced by the object factory and held in the instance store.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::CommandError;

/// Stateful object held by a [`Value`].
pub trait Object: Send + Sync + fmt::Debug {
    /// Type name shown by `namedInstanceList`.
    fn type_name(&self) -> &str;

    /// Human-readable form shown by `namedInstanceEcho`.
    fn display(&self) -> String;

    /// Release resources when the instance is removed.
    fn close(&self) -> Result<(), CommandError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Dynamically typed value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Object(Arc<dyn Object>),
}

impl Value {
    pub fn object<T: Object + 'static>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::List(_) => "List",
            Value::Object(object) => object.type_name(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Downcast an object value to a concrete type.
    pub fn downcast<T: Object + 'static>(&self) -> Option<&T> {
        match self {
            Value::Object(object) => object.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Run the close hook of an object value.
    pub fn close(&self) -> Result<(), CommandError> {
        match self {
            Value::Object(object) => object.close(),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(object) => f.write_str(&object.display()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// Shared integer counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicI64,
}

impl Counter {
    pub fn new(start: i64) -> Self {
        Self {
            value: AtomicI64::new(start),
        }
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Add `delta` and return the new value.
    pub fn add(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::SeqCst) + delta
    }
}

impl Object for Counter {
    fn type_name(&self) -> &str {
        "Counter"
    }

    fn display(&self) -> String {
        self.get().to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Mutable list of values; closing it clears the contents.
#[derive(Debug, Default)]
pub struct Collection {
    items: Mutex<Vec<Value>>,
}

impl Collection {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    pub fn push(&self, value: Value) -> Result<(), CommandError> {
        self.lock()?.push(value);
        Ok(())
    }

    /// Copy of the current items.
    pub fn items(&self) -> Result<Vec<Value>, CommandError> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Value>>, CommandError> {
        self.items
            .lock()
            .map_err(|e| CommandError::IllegalState(format!("Failed to acquire collection lock: {}", e)))
    }
}

impl Object for Collection {
    fn type_name(&self) -> &str {
        "Collection"
    }

    fn display(&self) -> String {
        match self.items() {
            Ok(items) => Value::List(items).to_string(),
            Err(e) => e.to_string(),
        }
    }

    fn close(&self) -> Result<(), CommandError> {
        self.lock()?.clear();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display() {
        let list = Value::List(vec![Value::Int(1), Value::from("two"), Value::Null]);
        assert_eq!(list.to_string(), "[1, two, null]");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(" 42 ").as_int(), Some(42));
        assert_eq!(Value::Float(3.0).as_int(), Some(3));
        assert_eq!(Value::Float(3.5).as_int(), None);
        assert_eq!(Value::Int(2).as_float(), Some(2.0));
        assert_eq!(Value::Bool(true).as_str(), None);
    }

    #[test]
    fn test_counter_object() {
        let value = Value::object(Counter::new(5));
        let counter = value.downcast::<Counter>().unwrap();
        assert_eq!(counter.add(2), 7);
        assert_eq!(value.to_string(), "7");
        assert_eq!(value.type_name(), "Counter");
        assert!(value.downcast::<Collection>().is_none());
    }

    #[test]
    fn test_collection_close_clears() {
        let value = Value::object(Collection::new(vec![Value::Int(1)]));
        let collection = value.downcast::<Collection>().unwrap();
        collection.push(Value::Int(2)).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(value.to_string(), "[1, 2]");

        value.close().unwrap();
        assert!(collection.is_empty());
    }
}
