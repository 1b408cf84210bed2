//! Operations executed against algorithms.

use std::fmt;
use std::time::Duration;

use crate::error::CommandError;
use crate::runtime::{InstanceStore, Value};

/// Shape of an operation.
#[derive(Debug, Clone)]
pub enum OperationKind {
    /// Insert records from a source value, optionally at most `count`.
    Insert { source: Value, count: Option<usize> },
    Count,
    /// Fetch the record at a zero-based position.
    Get(usize),
    /// Find records containing a substring.
    Search(String),
    Clear,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Insert { .. } => "Insert",
            OperationKind::Count => "Count",
            OperationKind::Get(_) => "Get",
            OperationKind::Search(_) => "Search",
            OperationKind::Clear => "Clear",
        }
    }
}

/// An operation together with its accumulated answer.
#[derive(Debug, Clone)]
pub struct Operation {
    kind: OperationKind,
    answer: Vec<Value>,
    executions: u32,
    elapsed: Duration,
}

impl Operation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            answer: Vec::new(),
            executions: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn answer(&self) -> &[Value] {
        &self.answer
    }

    pub fn push_answer(&mut self, value: Value) {
        self.answer.push(value);
    }

    pub fn reset_answer(&mut self) {
        self.answer.clear();
    }

    /// Number of completed executions.
    pub fn executions(&self) -> u32 {
        self.executions
    }

    /// Total time spent executing.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub(crate) fn record_execution(&mut self, elapsed: Duration) {
        self.executions += 1;
        self.elapsed += elapsed;
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (executions: {}, answer size: {}, elapsed: {} ms)",
            self.name(),
            self.executions,
            self.answer.len(),
            self.elapsed.as_millis()
        )
    }
}

/// Builds operations from a type name and string arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationFactory;

impl OperationFactory {
    /// Operation type names this factory knows.
    pub const TYPES: [&'static str; 5] = ["Insert", "Count", "Get", "Search", "Clear"];

    /// Create an operation. Each argument naming a stored instance is
    /// replaced by that instance.
    pub fn create(
        &self,
        type_name: &str,
        args: &[String],
        instances: &InstanceStore,
    ) -> Result<Operation, CommandError> {
        let values: Vec<Value> = args
            .iter()
            .map(|arg| instances.get(arg).unwrap_or_else(|| Value::Str(arg.clone())))
            .collect();

        let kind = match (type_name, values.as_slice()) {
            ("Insert", [source]) => OperationKind::Insert {
                source: source.clone(),
                count: None,
            },
            ("Insert", [source, count]) => OperationKind::Insert {
                source: source.clone(),
                count: Some(parse_count(count)?),
            },
            ("Count", []) => OperationKind::Count,
            ("Get", [position]) => OperationKind::Get(parse_count(position)?),
            ("Search", [needle]) => OperationKind::Search(needle.to_string()),
            ("Clear", []) => OperationKind::Clear,
            (name, _) if Self::TYPES.contains(&name) => {
                return Err(CommandError::IllegalArgument(format!(
                    "wrong arguments for operation {}: {:?}",
                    name, args
                )))
            }
            (name, _) => {
                return Err(CommandError::NoSuchInstantiator(format!("operation '{}'", name)))
            }
        };
        Ok(Operation::new(kind))
    }
}

fn parse_count(value: &Value) -> Result<usize, CommandError> {
    value
        .as_int()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| CommandError::IllegalArgument(format!("not a non-negative integer: {}", value)))
}
