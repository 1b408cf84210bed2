//! Stateful runtime driven by primitives.
//!
//! Holds the algorithm instances, the last executed operation, background
//! operations, the named instance store and the statistics counters.

mod algorithm;
mod factory;
mod instances;
mod operation;
mod shutdown;
mod stats;
mod stream;
mod value;

pub use algorithm::{create_algorithm, Algorithm, Discard, MemoryStorage, ALGORITHM_TYPES};
pub use factory::{Constructor, FactoryError, ObjectFactory};
pub use instances::InstanceStore;
pub use operation::{Operation, OperationFactory, OperationKind};
pub use shutdown::Shutdown;
pub use stats::Statistics;
pub use stream::{ObjectStream, RecordType};
pub use value::{Collection, Counter, Object, Value};

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::error::CommandError;

/// Algorithm shared between the runtime and blocking execution tasks.
pub type SharedAlgorithm = Arc<Mutex<Box<dyn Algorithm>>>;

type BackgroundHandle = JoinHandle<Result<Operation, CommandError>>;

/// Summary of a started algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmInfo {
    pub index: usize,
    pub name: String,
    pub size: usize,
    pub selected: bool,
}

#[derive(Default)]
struct AlgorithmSlots {
    algorithms: Vec<SharedAlgorithm>,
    selected: Option<usize>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, CommandError> {
    mutex
        .lock()
        .map_err(|e| CommandError::IllegalState(format!("Failed to acquire {} lock: {}", what, e)))
}

pub struct Runtime {
    instances: InstanceStore,
    factory: ObjectFactory,
    operations: OperationFactory,
    algorithms: Mutex<AlgorithmSlots>,
    last_operation: Arc<Mutex<Option<Operation>>>,
    background: Mutex<Vec<BackgroundHandle>>,
    stats: Arc<Statistics>,
    shutdown: Shutdown,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_factory(ObjectFactory::new())
    }

    /// Create a runtime with a custom object factory.
    pub fn with_factory(factory: ObjectFactory) -> Self {
        Self {
            instances: InstanceStore::new(),
            factory,
            operations: OperationFactory,
            algorithms: Mutex::new(AlgorithmSlots::default()),
            last_operation: Arc::new(Mutex::new(None)),
            background: Mutex::new(Vec::new()),
            stats: Arc::new(Statistics::new()),
            shutdown: Shutdown::new(),
        }
    }

    pub fn instances(&self) -> &InstanceStore {
        &self.instances
    }

    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Evaluate a signature against the named instances.
    pub fn instantiate(&self, signature: &str) -> Result<Value, CommandError> {
        self.factory
            .instantiate(signature, &self.instances)
            .map_err(CommandError::from)
    }

    /// Resolve string arguments: stored instances by name, strings otherwise.
    pub fn resolve_args(&self, args: &[String]) -> Vec<Value> {
        args.iter()
            .map(|arg| self.instances.get(arg).unwrap_or_else(|| Value::Str(arg.clone())))
            .collect()
    }

    /// Start an algorithm and select it. Returns its index.
    pub fn start_algorithm(&self, type_name: &str, args: &[String]) -> Result<usize, CommandError> {
        let algorithm = create_algorithm(type_name, &self.resolve_args(args))?;
        let mut slots = lock(&self.algorithms, "algorithm")?;
        slots.algorithms.push(Arc::new(Mutex::new(algorithm)));
        let index = slots.algorithms.len() - 1;
        slots.selected = Some(index);

        self.stats.increment("algorithms.started", 1);
        tracing::info!(algorithm = %type_name, index, "Algorithm started");
        Ok(index)
    }

    /// Finalize and remove an algorithm (the selected one by default).
    ///
    /// Afterwards the most recently started remaining algorithm is selected.
    pub fn stop_algorithm(&self, index: Option<usize>) -> Result<String, CommandError> {
        let mut slots = lock(&self.algorithms, "algorithm")?;
        let index = match index.or(slots.selected) {
            Some(index) if index < slots.algorithms.len() => index,
            Some(index) => {
                return Err(CommandError::NotFound(format!("algorithm with index {}", index)))
            }
            None => return Err(CommandError::IllegalState("No algorithm selected".to_string())),
        };

        let algorithm = slots.algorithms.remove(index);
        slots.selected = slots.algorithms.len().checked_sub(1);

        let mut algorithm = lock(&algorithm, "algorithm")?;
        algorithm.finalize();
        let name = algorithm.name().to_string();

        self.stats.increment("algorithms.stopped", 1);
        tracing::info!(algorithm = %name, index, "Algorithm stopped");
        Ok(name)
    }

    pub fn select_algorithm(&self, index: usize) -> Result<(), CommandError> {
        let mut slots = lock(&self.algorithms, "algorithm")?;
        if index >= slots.algorithms.len() {
            return Err(CommandError::NotFound(format!("algorithm with index {}", index)));
        }
        slots.selected = Some(index);
        Ok(())
    }

    pub fn algorithms(&self) -> Result<Vec<AlgorithmInfo>, CommandError> {
        let slots = lock(&self.algorithms, "algorithm")?;
        slots
            .algorithms
            .iter()
            .enumerate()
            .map(|(index, algorithm)| {
                let algorithm = lock(algorithm, "algorithm")?;
                Ok(AlgorithmInfo {
                    index,
                    name: algorithm.name().to_string(),
                    size: algorithm.size(),
                    selected: slots.selected == Some(index),
                })
            })
            .collect()
    }

    /// The selected algorithm and its index.
    pub fn selected_algorithm(&self) -> Result<(usize, SharedAlgorithm), CommandError> {
        let slots = lock(&self.algorithms, "algorithm")?;
        slots
            .selected
            .and_then(|index| slots.algorithms.get(index).map(|a| (index, a.clone())))
            .ok_or_else(|| CommandError::IllegalState("No algorithm selected".to_string()))
    }

    /// Construct an operation and remember it as the last one.
    pub fn prepare_operation(&self, type_name: &str, args: &[String]) -> Result<Operation, CommandError> {
        let operation = self.operations.create(type_name, args, &self.instances)?;
        self.set_last_operation(operation.clone())?;
        Ok(operation)
    }

    pub fn last_operation(&self) -> Option<Operation> {
        self.last_operation.lock().ok().and_then(|last| last.clone())
    }

    fn set_last_operation(&self, operation: Operation) -> Result<(), CommandError> {
        *lock(&self.last_operation, "operation")? = Some(operation);
        Ok(())
    }

    /// Run an operation on the selected algorithm and wait for it.
    pub async fn execute_operation(&self, operation: Operation) -> Result<Operation, CommandError> {
        let (_, algorithm) = self.selected_algorithm()?;
        self.set_last_operation(operation.clone())?;
        let operation = run_blocking(algorithm, operation, self.stats.clone()).await?;
        self.set_last_operation(operation.clone())?;
        Ok(operation)
    }

    /// Run an operation on the selected algorithm in the background.
    ///
    /// The completed operation replaces the last operation.
    pub fn execute_background(&self, operation: Operation) -> Result<(), CommandError> {
        let (index, algorithm) = self.selected_algorithm()?;
        let stats = self.stats.clone();
        let last = self.last_operation.clone();
        let name = operation.name();

        let handle = tokio::spawn(async move {
            let operation = run_blocking(algorithm, operation, stats).await?;
            if let Ok(mut last) = last.lock() {
                *last = Some(operation.clone());
            }
            Ok::<_, CommandError>(operation)
        });
        lock(&self.background, "background")?.push(handle);

        tracing::debug!(operation = %name, algorithm = index, "Background operation started");
        Ok(())
    }

    /// Number of background operations not yet joined.
    pub fn background_count(&self) -> usize {
        self.background.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Join every outstanding background operation.
    ///
    /// All handles are awaited; the first failure is returned afterwards.
    pub async fn wait_background(&self) -> Result<Vec<Operation>, CommandError> {
        let handles = std::mem::take(&mut *lock(&self.background, "background")?);

        let mut completed = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            let result = handle
                .await
                .map_err(|e| CommandError::Runtime(format!("Task join error: {}", e)))
                .and_then(|result| result);
            match result {
                Ok(operation) => completed.push(operation),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(completed),
        }
    }

    /// Run the last operation again, optionally clearing its answer first.
    pub async fn execute_again(&self, reset_answer: bool) -> Result<Operation, CommandError> {
        let mut operation = self
            .last_operation()
            .ok_or_else(|| CommandError::IllegalState("No operation prepared".to_string()))?;
        if reset_answer {
            operation.reset_answer();
        }
        self.execute_operation(operation).await
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("instances", &self.instances.len())
            .field("background", &self.background_count())
            .finish()
    }
}

/// Execute `operation` on a blocking thread, holding the algorithm lock.
async fn run_blocking(
    algorithm: SharedAlgorithm,
    mut operation: Operation,
    stats: Arc<Statistics>,
) -> Result<Operation, CommandError> {
    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let result = {
            let mut algorithm = lock(&algorithm, "algorithm")?;
            algorithm.execute(&mut operation)
        };
        let elapsed = start.elapsed();

        match result {
            Ok(()) => {
                operation.record_execution(elapsed);
                stats.increment("operations.executed", 1);
                stats.increment(&format!("operations.{}", operation.name()), 1);
                stats.record_duration("operations", elapsed);
                Ok(operation)
            }
            Err(e) => {
                stats.increment("operations.failed", 1);
                Err(e)
            }
        }
    })
    .await
    .map_err(|e| CommandError::Runtime(format!("Task join error: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_algorithm_lifecycle() {
        let runtime = Runtime::new();
        assert_eq!(runtime.start_algorithm("MemoryStorage", &[]).unwrap(), 0);
        assert_eq!(runtime.start_algorithm("Discard", &[]).unwrap(), 1);

        let infos = runtime.algorithms().unwrap();
        assert_eq!(infos.len(), 2);
        assert!(infos[1].selected);

        runtime.select_algorithm(0).unwrap();
        assert_eq!(runtime.selected_algorithm().unwrap().0, 0);
        assert!(runtime.select_algorithm(5).is_err());

        assert_eq!(runtime.stop_algorithm(None).unwrap(), "MemoryStorage");
        assert_eq!(runtime.algorithms().unwrap()[0].name, "Discard");
        assert_eq!(runtime.stop_algorithm(Some(0)).unwrap(), "Discard");

        let err = runtime.stop_algorithm(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
        assert_eq!(runtime.statistics().get("algorithms.stopped"), Some(2));
    }

    #[tokio::test]
    async fn test_execute_requires_algorithm() {
        let runtime = Runtime::new();
        let op = runtime.prepare_operation("Count", &[]).unwrap();
        let err = runtime.execute_operation(op).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IllegalState);
    }

    #[tokio::test]
    async fn test_execute_and_again() {
        let runtime = Runtime::new();
        runtime.start_algorithm("MemoryStorage", &[]).unwrap();

        let op = runtime.prepare_operation("Insert", &args(&["record"])).unwrap();
        let op = runtime.execute_operation(op).await.unwrap();
        assert_eq!(op.executions(), 1);

        let again = runtime.execute_again(false).await.unwrap();
        assert_eq!(again.executions(), 2);
        assert_eq!(again.answer().len(), 2);

        let reset = runtime.execute_again(true).await.unwrap();
        assert_eq!(reset.answer().len(), 1);
        assert_eq!(runtime.statistics().get("operations.Insert"), Some(3));
    }

    #[tokio::test]
    async fn test_background_operations() {
        let runtime = Runtime::new();
        runtime.start_algorithm("MemoryStorage", &[]).unwrap();
        runtime.instances().add("rows", Value::List(vec!["a".into(), "b".into()])).unwrap();

        let op = runtime.prepare_operation("Insert", &args(&["rows"])).unwrap();
        runtime.execute_background(op).unwrap();
        let op = runtime.prepare_operation("Insert", &args(&["rows"])).unwrap();
        runtime.execute_background(op).unwrap();
        assert_eq!(runtime.background_count(), 2);

        let done = runtime.wait_background().await.unwrap();
        assert_eq!(done.len(), 2);
        assert_eq!(runtime.background_count(), 0);
        assert_eq!(runtime.algorithms().unwrap()[0].size, 4);
        assert!(runtime.last_operation().is_some_and(|op| op.executions() == 1));
    }

    #[test]
    fn test_instantiate_uses_store() {
        let runtime = Runtime::new();
        runtime.instances().add("x", Value::Int(3)).unwrap();
        let value = runtime.instantiate("List(x, x)").unwrap();
        assert_eq!(value.to_string(), "[3, 3]");
        assert_eq!(
            runtime.instantiate("Nope").unwrap_err().kind(),
            ErrorKind::NoSuchInstantiator
        );
    }
}
