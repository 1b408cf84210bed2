//! Object stream commands.
//!
//! Streams live in the named instance store, so operations and signatures
//! can refer to them by name.

use async_trait::async_trait;
use std::io::Write;

use crate::error::CommandError;
use crate::executor::Interpreter;
use crate::registry::{Arity, Command};
use crate::runtime::{ObjectStream, RecordType, Value};

fn require_stream(interp: &Interpreter, name: &str) -> Result<Value, CommandError> {
    let value = interp.runtime().instances().require(name)?;
    if value.downcast::<ObjectStream>().is_none() {
        return Err(CommandError::IllegalArgument(format!(
            "named instance '{}' is a {}, not an object stream",
            name,
            value.type_name()
        )));
    }
    Ok(value)
}

pub struct ObjectStreamOpenCommand;

#[async_trait]
impl Command for ObjectStreamOpenCommand {
    fn name(&self) -> &'static str {
        "objectStreamOpen"
    }

    fn description(&self) -> &'static str {
        "Open a record file as a named object stream"
    }

    fn usage(&self) -> &'static str {
        "<file> <recordType> <name>"
    }

    fn arity(&self) -> Arity {
        Arity::exactly(3)
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        _out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let record_type: RecordType = args[1].parse()?;
        let stream = ObjectStream::open(&args[0], record_type)?;
        interp.runtime().instances().add(&args[2], Value::object(stream))?;
        tracing::debug!(name = %args[2], path = %args[0], record_type = %record_type, "Object stream opened");
        Ok(true)
    }
}

pub struct ObjectStreamCloseCommand;

#[async_trait]
impl Command for ObjectStreamCloseCommand {
    fn name(&self) -> &'static str {
        "objectStreamClose"
    }

    fn description(&self) -> &'static str {
        "Close a named object stream and remove it"
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
        require_stream(interp, &args[0])?;
        interp.runtime().instances().remove(&args[0])?.close()?;
        Ok(true)
    }
}

pub struct ObjectStreamResetCommand;

#[async_trait]
impl Command for ObjectStreamResetCommand {
    fn name(&self) -> &'static str {
        "objectStreamReset"
    }

    fn description(&self) -> &'static str {
        "Rewind a named object stream to its first record"
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
        let value = require_stream(interp, &args[0])?;
        if let Some(stream) = value.downcast::<ObjectStream>() {
            stream.reset()?;
        }
        Ok(true)
    }
}
