//! Algorithms that operations execute against.

use std::fmt;

use crate::error::CommandError;
use crate::runtime::{Collection, ObjectStream, Operation, OperationKind, Value};

/// Computational engine instance managed by `algorithmStart`/`algorithmStop`.
pub trait Algorithm: Send + fmt::Debug {
    /// Type name of the algorithm.
    fn name(&self) -> &str;

    /// Number of stored records.
    fn size(&self) -> usize;

    /// Run `operation`, appending results to its answer.
    ///
    /// Fails with `NoSuchMethod` when the operation shape is not supported.
    fn execute(&mut self, operation: &mut Operation) -> Result<(), CommandError>;

    /// Release resources before the algorithm is dropped.
    fn finalize(&mut self) {}
}

/// Algorithm type names known to [`create_algorithm`].
pub const ALGORITHM_TYPES: [&str; 2] = ["MemoryStorage", "Discard"];

/// Construct an algorithm from a type name and resolved arguments.
pub fn create_algorithm(type_name: &str, args: &[Value]) -> Result<Box<dyn Algorithm>, CommandError> {
    match type_name {
        "MemoryStorage" => {
            let capacity = match args {
                [] => None,
                [capacity] => Some(
                    capacity
                        .as_int()
                        .and_then(|n| usize::try_from(n).ok())
                        .ok_or_else(|| {
                            CommandError::Instantiation(format!("MemoryStorage: invalid capacity {}", capacity))
                        })?,
                ),
                _ => {
                    return Err(CommandError::Instantiation(format!(
                        "MemoryStorage takes at most one argument, got {}",
                        args.len()
                    )))
                }
            };
            Ok(Box::new(MemoryStorage::new(capacity)))
        }
        "Discard" => Ok(Box::new(Discard::default())),
        other => Err(CommandError::NoSuchInstantiator(format!("algorithm '{}'", other))),
    }
}

/// Records produced by an insert source.
fn source_records(source: &Value, count: Option<usize>) -> Result<Vec<String>, CommandError> {
    let values = if let Some(stream) = source.downcast::<ObjectStream>() {
        stream.take(count)?
    } else if let Some(collection) = source.downcast::<Collection>() {
        limit(collection.items()?, count)
    } else if let Value::List(items) = source {
        limit(items.clone(), count)
    } else {
        vec![source.clone()]
    };
    Ok(values.iter().map(Value::to_string).collect())
}

fn limit(mut values: Vec<Value>, count: Option<usize>) -> Vec<Value> {
    if let Some(n) = count {
        values.truncate(n);
    }
    values
}

/// In-memory record storage with substring search.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: Vec<String>,
    capacity: Option<usize>,
}

impl MemoryStorage {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            records: Vec::new(),
            capacity,
        }
    }
}

impl Algorithm for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn size(&self) -> usize {
        self.records.len()
    }

    fn execute(&mut self, operation: &mut Operation) -> Result<(), CommandError> {
        match operation.kind().clone() {
            OperationKind::Insert { source, count } => {
                let records = source_records(&source, count)?;
                if let Some(capacity) = self.capacity {
                    if self.records.len() + records.len() > capacity {
                        return Err(CommandError::IllegalState(format!(
                            "capacity {} exceeded",
                            capacity
                        )));
                    }
                }
                operation.push_answer(Value::Int(records.len() as i64));
                self.records.extend(records);
            }
            OperationKind::Count => operation.push_answer(Value::Int(self.records.len() as i64)),
            OperationKind::Get(position) => {
                let record = self.records.get(position).ok_or_else(|| {
                    CommandError::NoSuchElement(format!(
                        "position {} of {} records",
                        position,
                        self.records.len()
                    ))
                })?;
                operation.push_answer(Value::Str(record.clone()));
            }
            OperationKind::Search(needle) => {
                for record in self.records.iter().filter(|r| r.contains(&needle)) {
                    operation.push_answer(Value::Str(record.clone()));
                }
            }
            OperationKind::Clear => {
                operation.push_answer(Value::Int(self.records.len() as i64));
                self.records.clear();
            }
        }
        Ok(())
    }

    fn finalize(&mut self) {
        self.records.clear();
    }
}

/// Counts inserted records without storing them.
#[derive(Debug, Default)]
pub struct Discard {
    inserted: usize,
}

impl Algorithm for Discard {
    fn name(&self) -> &str {
        "Discard"
    }

    fn size(&self) -> usize {
        0
    }

    fn execute(&mut self, operation: &mut Operation) -> Result<(), CommandError> {
        match operation.kind().clone() {
            OperationKind::Insert { source, count } => {
                let inserted = source_records(&source, count)?.len();
                self.inserted += inserted;
                operation.push_answer(Value::Int(inserted as i64));
                Ok(())
            }
            OperationKind::Count => {
                operation.push_answer(Value::Int(self.inserted as i64));
                Ok(())
            }
            other => Err(CommandError::NoSuchMethod(format!(
                "Discard does not support {}",
                other.name()
            ))),
        }
    }
}
