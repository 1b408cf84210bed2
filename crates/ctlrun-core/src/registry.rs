//! Primitive command registry and dispatch.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use crate::error::CommandError;
use crate::executor::Interpreter;

/// Number of arguments a command accepts (method name excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    /// No arguments.
    pub const NONE: Arity = Arity::exactly(0);

    /// Any number of arguments.
    pub const ANY: Arity = Arity::at_least(0);

    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn at_least(n: usize) -> Self {
        Self { min: n, max: None }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    /// Check if `count` arguments are accepted.
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}+", self.min),
        }
    }
}

/// Primitive command invoked by actions and front-ends.
///
/// `Ok(false)` is an ordinary failure that the command has already reported
/// on `out`; `Err` is an error that action policies can match on.
#[async_trait]
pub trait Command: Send + Sync {
    /// Returns the command's unique name.
    fn name(&self) -> &'static str;

    /// One-line description shown by `help`.
    fn description(&self) -> &'static str;

    /// Argument synopsis, e.g. `<index>`.
    fn usage(&self) -> &'static str {
        ""
    }

    fn arity(&self) -> Arity {
        Arity::ANY
    }

    /// Execute the command with its string arguments.
    async fn execute(
        &self,
        interp: &Interpreter,
        out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError>;
}

/// Registry of available commands.
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a new empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Register a command, replacing any command of the same name.
    pub fn register<C: Command + 'static>(&mut self, command: C) {
        let name = command.name().to_string();
        self.commands.insert(name, Arc::new(command));
    }

    /// Get a command by name. `None` means "no such primitive".
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// Check if a command is registered.
    pub fn has(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// List all registered command names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// All commands, sorted by name.
    pub fn commands(&self) -> Vec<Arc<dyn Command>> {
        self.list()
            .into_iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Execute a command by name.
    pub async fn execute(
        &self,
        name: &str,
        interp: &Interpreter,
        out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let command = self
            .get(name)
            .ok_or_else(|| CommandError::NotFound(format!("command '{}'", name)))?;
        invoke(command.as_ref(), interp, out, args).await
    }
}

/// Check the arity of `args` and run `command`.
///
/// A wrong argument count prints the usage and fails without running.
pub async fn invoke(
    command: &dyn Command,
    interp: &Interpreter,
    out: &mut (dyn Write + Send),
    args: &[String],
) -> Result<bool, CommandError> {
    if !command.arity().accepts(args.len()) {
        writeln!(
            out,
            "Wrong number of arguments for '{}' (expected {}, got {})",
            command.name(),
            command.arity(),
            args.len()
        )?;
        writeln!(out, "Usage: {} {}", command.name(), command.usage())?;
        return Ok(false);
    }

    tracing::debug!(command = %command.name(), args = ?args, "Executing command");
    command.execute(interp, out, args).await
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.list())
            .finish()
    }
}
