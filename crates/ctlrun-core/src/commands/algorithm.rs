//! Algorithm lifecycle commands.

use async_trait::async_trait;
use std::io::Write;

use super::parse_index;
use crate::error::CommandError;
use crate::executor::Interpreter;
use crate::registry::{Arity, Command};
use crate::runtime::ALGORITHM_TYPES;

pub struct AlgorithmStartCommand;

#[async_trait]
impl Command for AlgorithmStartCommand {
    fn name(&self) -> &'static str {
        "algorithmStart"
    }

    fn description(&self) -> &'static str {
        "Start an algorithm and select it"
    }

    fn usage(&self) -> &'static str {
        "<type> [args...]"
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
        let index = interp.runtime().start_algorithm(&args[0], &args[1..])?;
        writeln!(out, "Algorithm {} started with index {}", args[0], index)?;
        Ok(true)
    }
}

pub struct AlgorithmStopCommand;

#[async_trait]
impl Command for AlgorithmStopCommand {
    fn name(&self) -> &'static str {
        "algorithmStop"
    }

    fn description(&self) -> &'static str {
        "Finalize an algorithm (the selected one by default)"
    }

    fn usage(&self) -> &'static str {
        "[index]"
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
        let index = args.first().map(|arg| parse_index(arg)).transpose()?;
        let name = interp.runtime().stop_algorithm(index)?;
        writeln!(out, "Algorithm {} stopped", name)?;
        Ok(true)
    }
}

pub struct AlgorithmSelectCommand;

#[async_trait]
impl Command for AlgorithmSelectCommand {
    fn name(&self) -> &'static str {
        "algorithmSelect"
    }

    fn description(&self) -> &'static str {
        "Select the algorithm operations run on"
    }

    fn usage(&self) -> &'static str {
        "<index>"
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
        interp.runtime().select_algorithm(parse_index(&args[0])?)?;
        Ok(true)
    }
}

pub struct AlgorithmListCommand;

#[async_trait]
impl Command for AlgorithmListCommand {
    fn name(&self) -> &'static str {
        "algorithmList"
    }

    fn description(&self) -> &'static str {
        "List started algorithms"
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
        for info in interp.runtime().algorithms()? {
            let marker = if info.selected { "*" } else { " " };
            writeln!(out, "{}{}: {} (size {})", marker, info.index, info.name, info.size)?;
        }
        Ok(true)
    }
}

/// Shows the selected algorithm, or the available types when none runs.
pub struct AlgorithmInfoCommand;

#[async_trait]
impl Command for AlgorithmInfoCommand {
    fn name(&self) -> &'static str {
        "algorithmInfo"
    }

    fn description(&self) -> &'static str {
        "Describe the selected algorithm"
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
        let info = interp.runtime().algorithms()?.into_iter().find(|info| info.selected);
        match info {
            Some(info) => writeln!(out, "{}: {} (size {})", info.index, info.name, info.size)?,
            None => {
                writeln!(out, "No algorithm selected")?;
                writeln!(out, "Available types: {}", ALGORITHM_TYPES.join(", "))?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::{interpreter, run};
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_start_list_stop() {
        let interp = interpreter();
        let (result, out) = run(&interp, "algorithmStart", &["MemoryStorage"]).await;
        assert!(result.unwrap());
        assert_eq!(out, "Algorithm MemoryStorage started with index 0\n");

        run(&interp, "algorithmStart", &["Discard"]).await.0.unwrap();
        let (_, out) = run(&interp, "algorithmList", &[]).await;
        assert_eq!(out, " 0: MemoryStorage (size 0)\n*1: Discard (size 0)\n");

        run(&interp, "algorithmSelect", &["0"]).await.0.unwrap();
        let (_, out) = run(&interp, "algorithmInfo", &[]).await;
        assert_eq!(out, "0: MemoryStorage (size 0)\n");

        let (result, out) = run(&interp, "algorithmStop", &[]).await;
        assert!(result.unwrap());
        assert_eq!(out, "Algorithm MemoryStorage stopped\n");
        assert_eq!(interp.runtime().algorithms().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_errors() {
        let interp = interpreter();
        let (result, _) = run(&interp, "algorithmStart", &["Quantum"]).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NoSuchInstantiator);

        let (result, _) = run(&interp, "algorithmStop", &[]).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::IllegalState);

        let (result, _) = run(&interp, "algorithmSelect", &["3"]).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);

        let (_, out) = run(&interp, "algorithmInfo", &[]).await;
        assert!(out.contains("Available types: MemoryStorage, Discard"));
    }
}
