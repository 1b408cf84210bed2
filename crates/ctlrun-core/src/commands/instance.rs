//! Named instance commands.

use async_trait::async_trait;
use std::io::Write;

use crate::error::CommandError;
use crate::executor::Interpreter;
use crate::registry::{Arity, Command};

pub struct NamedInstanceAddCommand;

#[async_trait]
impl Command for NamedInstanceAddCommand {
    fn name(&self) -> &'static str {
        "namedInstanceAdd"
    }

    fn description(&self) -> &'static str {
        "Create an object from a signature and store it under a name"
    }

    fn usage(&self) -> &'static str {
        "<signature> <name>"
    }

    fn arity(&self) -> Arity {
        Arity::exactly(2)
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        _out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let runtime = interp.runtime();
        let value = runtime.instantiate(&args[0])?;
        runtime.instances().add(&args[1], value)?;
        Ok(true)
    }
}

pub struct NamedInstanceReplaceCommand;

#[async_trait]
impl Command for NamedInstanceReplaceCommand {
    fn name(&self) -> &'static str {
        "namedInstanceReplace"
    }

    fn description(&self) -> &'static str {
        "Create an object and store it, replacing any previous one"
    }

    fn usage(&self) -> &'static str {
        "<signature> <name>"
    }

    fn arity(&self) -> Arity {
        Arity::exactly(2)
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        _out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let runtime = interp.runtime();
        let value = runtime.instantiate(&args[0])?;
        if let Some(previous) = runtime.instances().replace(&args[1], value)? {
            previous.close()?;
        }
        Ok(true)
    }
}

pub struct NamedInstanceRemoveCommand;

#[async_trait]
impl Command for NamedInstanceRemoveCommand {
    fn name(&self) -> &'static str {
        "namedInstanceRemove"
    }

    fn description(&self) -> &'static str {
        "Remove a named instance, closing it"
    }

    fn usage(&self) -> &'static str {
        "<name>"
    }

    fn arity(&self) -> Arity {
        Arity::exactly(1)
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        _out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        interp.runtime().instances().remove(&args[0])?.close()?;
        Ok(true)
    }
}

pub struct NamedInstanceListCommand;

#[async_trait]
impl Command for NamedInstanceListCommand {
    fn name(&self) -> &'static str {
        "namedInstanceList"
    }

    fn description(&self) -> &'static str {
        "List named instances and their types"
    }

    fn arity(&self) -> Arity {
        Arity::NONE
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        out: &mut (dyn Write + Send),
        _args: &[String],
    ) -> Result<bool, CommandError> {
        for (name, value) in interp.runtime().instances().entries() {
            writeln!(out, "{}: {}", name, value.type_name())?;
        }
        Ok(true)
    }
}

pub struct NamedInstanceEchoCommand;

#[async_trait]
impl Command for NamedInstanceEchoCommand {
    fn name(&self) -> &'static str {
        "namedInstanceEcho"
    }

    fn description(&self) -> &'static str {
        "Print a named instance"
    }

    fn usage(&self) -> &'static str {
        "<name>"
    }

    fn arity(&self) -> Arity {
        Arity::exactly(1)
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let value = interp.runtime().instances().require(&args[0])?;
        writeln!(out, "{}", value)?;
        Ok(true)
    }
}
