//! Recursive action execution engine.
//!
//! An action resolves to a block of sub-actions, a primitive command or an
//! alias of another action. Loops, postponement, error policies, output
//! redirection and variable assignment are applied around each invocation.

mod repeat;

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::context::{LoopVariable, Variables};
use crate::control::{read_arguments, read_modifier, ActionDescriptor, ControlFile, Modifier};
use crate::error::{CommandError, EngineError};
use crate::output::{resolve_output, OutputFiles, OutputTarget};
use crate::policy::{delay_until_now, ActionPlan};
use crate::registry::{invoke, CommandRegistry};
use crate::result::Disposition;
use crate::runtime::{Runtime, Shutdown};

/// Mutable state of one top-level control-file run.
///
/// The variables belong to the caller; the output files are closed when
/// the frame is dropped.
pub struct Frame<'v> {
    config: Arc<ControlFile>,
    variables: &'v mut Variables,
    files: OutputFiles,
}

impl<'v> Frame<'v> {
    pub fn new(config: Arc<ControlFile>, variables: &'v mut Variables) -> Self {
        Self {
            config,
            variables,
            files: OutputFiles::new(),
        }
    }

    pub fn config(&self) -> &ControlFile {
        &self.config
    }

    pub fn variables(&self) -> &Variables {
        &*self.variables
    }

    pub fn files(&self) -> &OutputFiles {
        &self.files
    }
}

struct Inner {
    registry: CommandRegistry,
    runtime: Runtime,
    repeats: Mutex<HashMap<String, JoinHandle<()>>>,
}

/// Control-file interpreter bound to a command registry and a runtime.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Interpreter {
    inner: Arc<Inner>,
}

impl Interpreter {
    /// Create an interpreter with a fresh runtime.
    pub fn new(registry: CommandRegistry) -> Self {
        Self::with_runtime(registry, Runtime::new())
    }

    pub fn with_runtime(registry: CommandRegistry, runtime: Runtime) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                runtime,
                repeats: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.inner.registry
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn shutdown(&self) -> &Shutdown {
        self.inner.runtime.shutdown()
    }

    /// Run a primitive command by name.
    pub async fn run_command(
        &self,
        name: &str,
        out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        self.registry().execute(name, self, out, args).await
    }

    /// Load a control file and run `action` from it.
    pub async fn run_control_file_path(
        &self,
        path: impl AsRef<Path>,
        action: &str,
        variables: &mut Variables,
        out: &mut (dyn Write + Send),
    ) -> Result<bool, EngineError> {
        let config = ControlFile::load(path)?;
        self.run_control_file(Arc::new(config), action, variables, out)
            .await
    }

    /// Run `action` as a top-level invocation.
    ///
    /// Action failures are reported on `out` and yield `Ok(false)`. An error
    /// escaping the top-level invocation is an internal consistency failure.
    pub async fn run_control_file(
        &self,
        config: Arc<ControlFile>,
        action: &str,
        variables: &mut Variables,
        out: &mut (dyn Write + Send),
    ) -> Result<bool, EngineError> {
        tracing::info!(
            action = %action,
            source = ?config.source(),
            "Running control file"
        );

        let mut frame = Frame::new(config, variables);
        match self.execute_action(&mut frame, action, out, false).await {
            Ok(success) => {
                tracing::debug!(action = %action, success, "Control file run finished");
                Ok(success)
            }
            Err(source) => {
                tracing::error!(action = %action, error = %source, "Error escaped top-level action");
                Err(EngineError::Internal {
                    action: action.to_string(),
                    source,
                })
            }
        }
    }

    /// Execute one action invocation.
    ///
    /// With `throw` set, errors not handled by the action's own policy are
    /// returned to the caller instead of being reported.
    pub fn execute_action<'a, 'v: 'a>(
        &'a self,
        frame: &'a mut Frame<'v>,
        action: &'a str,
        out: &'a mut (dyn Write + Send),
        throw: bool,
    ) -> BoxFuture<'a, Result<bool, CommandError>> {
        Box::pin(async move {
            let descriptor = ActionDescriptor::read(&frame.config, action, frame.variables);
            self.runtime().statistics().increment("actions.executed", 1);
            let assign = descriptor
                .assign
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string);

            let mut assign_buffer: Vec<u8> = Vec::new();
            let buffer = assign.is_some().then_some(&mut assign_buffer);
            let Some(mut target) = resolve_output(
                out,
                &frame.config,
                action,
                frame.variables,
                &mut frame.files,
                buffer,
            ) else {
                return Ok(false);
            };
            let assigning = matches!(target, OutputTarget::Buffer(_));

            let plan = match ActionPlan::resolve(&descriptor) {
                Ok(plan) => plan,
                Err(message) => {
                    diagnose(&mut target, action, &message);
                    return Ok(false);
                }
            };
            if let Some(warning) = &plan.warning {
                diagnose(&mut target, action, warning);
            }

            if let Some(time) = plan.postpone_until {
                let delay = delay_until_now(time);
                if !delay.is_zero() {
                    tracing::debug!(
                        action = %action,
                        delay_ms = delay.as_millis() as u64,
                        "Postponing action"
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            let nested_throw = throw || plan.policy.catches();
            let loop_variable = plan
                .iterations
                .binds_loop_variable()
                .then(|| LoopVariable::save(frame.variables, descriptor.loop_variable_name()));

            let mut outcome: Result<bool, CommandError> = Ok(true);
            let mut iteration = 0;
            while plan.iterations.has_iteration(iteration) {
                if self.shutdown().is_triggered() {
                    diagnose(
                        &mut target,
                        action,
                        &format!("Action '{}' interrupted by shutdown", action),
                    );
                    outcome = Ok(false);
                    break;
                }

                if let Some(loop_variable) = &loop_variable {
                    loop_variable.bind(frame.variables, &plan.iterations.value(iteration), iteration);
                }
                if let Some(text) = read_modifier(&frame.config, action, Modifier::Description, frame.variables) {
                    let _ = writeln!(target, "{}", text);
                }

                let arguments = read_arguments(&frame.config, action, frame.variables);
                match self
                    .dispatch(frame, action, &arguments, &mut target, nested_throw)
                    .await
                {
                    Ok(true) => {
                        if let Some(text) =
                            read_modifier(&frame.config, action, Modifier::DescriptionAfter, frame.variables)
                        {
                            let _ = writeln!(target, "{}", text);
                        }
                    }
                    Ok(false) => {
                        outcome = Ok(false);
                        break;
                    }
                    Err(err) => match plan.policy.classify(err, throw) {
                        Disposition::Terminate(kind) => {
                            tracing::debug!(action = %action, kind = %kind, iteration, "Loop terminated by error");
                            break;
                        }
                        Disposition::Ignore(kind) => {
                            tracing::debug!(action = %action, kind = %kind, iteration, "Error ignored");
                        }
                        Disposition::Propagate(err) => {
                            outcome = Err(err);
                            break;
                        }
                        Disposition::Report(err) => {
                            let _ = writeln!(target, "Error in action '{}': {}", action, err);
                            tracing::error!(action = %action, error = %err, "Action failed");
                            outcome = Ok(false);
                            break;
                        }
                    },
                }
                iteration += 1;
            }

            if let Some(loop_variable) = loop_variable {
                loop_variable.restore(frame.variables);
            }
            drop(target);

            if assigning && matches!(outcome, Ok(true)) {
                if let Some(name) = assign {
                    let text = String::from_utf8_lossy(&assign_buffer);
                    frame.variables.set(name, text.trim_end());
                }
            }

            if let (Some(interval), Ok(true)) = (plan.repeat_every, &outcome) {
                self.schedule_repeat(frame, action, interval);
            }

            outcome
        })
    }

    /// Run the resolved target of one iteration.
    async fn dispatch(
        &self,
        frame: &mut Frame<'_>,
        action: &str,
        arguments: &[String],
        out: &mut (dyn Write + Send),
        throw: bool,
    ) -> Result<bool, CommandError> {
        let target = arguments[0].as_str();

        if target.contains(char::is_whitespace) {
            for sub_action in target.split_whitespace() {
                if !self.execute_action(frame, sub_action, out, throw).await? {
                    return Ok(false);
                }
            }
            return Ok(true);
        }

        if let Some(command) = self.registry().get(target) {
            return invoke(command.as_ref(), self, out, &arguments[1..]).await;
        }

        if target != action {
            // Alias: the target names another action
            return self.execute_action(frame, target, out, throw).await;
        }

        diagnose(
            out,
            action,
            &format!("Action '{}' not found in the control file", action),
        );
        Ok(false)
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("registry", &self.inner.registry)
            .field("runtime", &self.inner.runtime)
            .field("repeating", &self.repeating_actions())
            .finish()
    }
}

/// Write a diagnostic to the action's output and the log.
fn diagnose(out: &mut dyn Write, action: &str, message: &str) {
    let _ = writeln!(out, "{}", message);
    tracing::warn!(action = %action, "{}", message);
}
