//! General-purpose commands.

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use crate::context::Variables;
use crate::control::DEFAULT_ACTION;
use crate::error::{CommandError, EngineError, ErrorKind};
use crate::executor::Interpreter;
use crate::registry::{Arity, Command};

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Lists commands, or describes one.
pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn description(&self) -> &'static str {
        "List all commands or describe one"
    }

    fn usage(&self) -> &'static str {
        "[command]"
    }

    fn arity(&self) -> Arity {
        Arity::range(0, 1)
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        if let Some(name) = args.first() {
            let Some(command) = interp.registry().get(name) else {
                writeln!(out, "Unknown command: {}", name)?;
                return Ok(false);
            };
            writeln!(out, "{} {}", command.name(), command.usage())?;
            writeln!(out, "    {}", command.description())?;
            return Ok(true);
        }

        writeln!(out, "Available commands:")?;
        for command in interp.registry().commands() {
            writeln!(out, "  {:<24} {}", command.name(), command.description())?;
        }
        Ok(true)
    }
}

/// Writes its arguments separated by spaces.
pub struct EchoCommand;

#[async_trait]
impl Command for EchoCommand {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> &'static str {
        "Print the arguments"
    }

    fn usage(&self) -> &'static str {
        "[text...]"
    }

    async fn execute(
        &self,
        _interp: &Interpreter,
        out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        writeln!(out, "{}", args.join(" "))?;
        Ok(true)
    }
}

/// Sleeps, waking early with `Interrupted` on shutdown.
pub struct SleepCommand;

#[async_trait]
impl Command for SleepCommand {
    fn name(&self) -> &'static str {
        "sleep"
    }

    fn description(&self) -> &'static str {
        "Sleep for the given number of milliseconds"
    }

    fn usage(&self) -> &'static str {
        "<millis>"
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
        let millis: u64 = args[0]
            .trim()
            .parse()
            .map_err(|_| CommandError::IllegalArgument(format!("not a number of milliseconds: {}", args[0])))?;

        tokio::select! {
            _ = interp.shutdown().wait() => {
                Err(CommandError::Interrupted("sleep interrupted by shutdown".to_string()))
            }
            _ = tokio::time::sleep(Duration::from_millis(millis)) => Ok(true),
        }
    }
}

/// Prints the local time.
pub struct CurrentTimeCommand;

#[async_trait]
impl Command for CurrentTimeCommand {
    fn name(&self) -> &'static str {
        "currentTime"
    }

    fn description(&self) -> &'static str {
        "Print the current local time (strftime format)"
    }

    fn usage(&self) -> &'static str {
        "[format]"
    }

    fn arity(&self) -> Arity {
        Arity::range(0, 1)
    }

    async fn execute(
        &self,
        _interp: &Interpreter,
        out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let format = args.first().map(String::as_str).unwrap_or(DEFAULT_TIME_FORMAT);
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Err(CommandError::IllegalArgument(format!("invalid time format: {}", format)));
        }
        writeln!(out, "{}", chrono::Local::now().format(format))?;
        Ok(true)
    }
}

/// Runs another control file as a separate top-level run.
pub struct ControlFileCommand;

#[async_trait]
impl Command for ControlFileCommand {
    fn name(&self) -> &'static str {
        "controlFile"
    }

    fn description(&self) -> &'static str {
        "Run an action of another control file"
    }

    fn usage(&self) -> &'static str {
        "<path> [action] [name=value...]"
    }

    fn arity(&self) -> Arity {
        Arity::at_least(1)
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let mut variables = Variables::new();
        let mut action: &str = DEFAULT_ACTION;
        for arg in &args[1..] {
            if !variables.assign(arg) {
                action = arg.as_str();
            }
        }

        match interp
            .run_control_file_path(&args[0], action, &mut variables, out)
            .await
        {
            Ok(success) => Ok(success),
            Err(EngineError::ControlFile(e)) => {
                writeln!(out, "{}", e)?;
                Ok(false)
            }
            Err(EngineError::Internal { source, .. }) => Err(source),
        }
    }
}

/// Raises an error of the given kind.
pub struct FailCommand;

#[async_trait]
impl Command for FailCommand {
    fn name(&self) -> &'static str {
        "fail"
    }

    fn description(&self) -> &'static str {
        "Raise an error of the given kind (Runtime by default)"
    }

    fn usage(&self) -> &'static str {
        "[kind] [message...]"
    }

    async fn execute(
        &self,
        _interp: &Interpreter,
        _out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let kind = match args.first() {
            Some(kind) => ErrorKind::from_str(kind)
                .map_err(|e| CommandError::IllegalArgument(e.to_string()))?,
            None => ErrorKind::Runtime,
        };
        let message = match args.get(1..) {
            Some(rest) if !rest.is_empty() => rest.join(" "),
            _ => "failed on request".to_string(),
        };
        Err(CommandError::new(kind, message))
    }
}

/// Triggers the process-wide shutdown signal.
pub struct QuitCommand;

#[async_trait]
impl Command for QuitCommand {
    fn name(&self) -> &'static str {
        "quit"
    }

    fn description(&self) -> &'static str {
        "Stop the server and all background tasks"
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
        writeln!(out, "Shutting down")?;
        interp.shutdown().trigger();
        Ok(true)
    }
}
