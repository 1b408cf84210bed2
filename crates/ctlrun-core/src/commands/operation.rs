//! Operation commands.

use async_trait::async_trait;
use std::io::Write;

use super::parse_flag;
use crate::error::CommandError;
use crate::executor::Interpreter;
use crate::registry::{Arity, Command};
use crate::runtime::Operation;

fn last_operation(interp: &Interpreter) -> Result<Operation, CommandError> {
    interp
        .runtime()
        .last_operation()
        .ok_or_else(|| CommandError::IllegalState("No operation prepared".to_string()))
}

pub struct OperationPrepareCommand;

#[async_trait]
impl Command for OperationPrepareCommand {
    fn name(&self) -> &'static str {
        "operationPrepare"
    }

    fn description(&self) -> &'static str {
        "Create an operation without executing it"
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
        _out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        interp.runtime().prepare_operation(&args[0], &args[1..])?;
        Ok(true)
    }
}

pub struct OperationExecuteCommand;

#[async_trait]
impl Command for OperationExecuteCommand {
    fn name(&self) -> &'static str {
        "operationExecute"
    }

    fn description(&self) -> &'static str {
        "Create an operation and run it on the selected algorithm"
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
        _out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let runtime = interp.runtime();
        let operation = runtime.prepare_operation(&args[0], &args[1..])?;
        runtime.execute_operation(operation).await?;
        Ok(true)
    }
}

pub struct OperationBgExecuteCommand;

#[async_trait]
impl Command for OperationBgExecuteCommand {
    fn name(&self) -> &'static str {
        "operationBgExecute"
    }

    fn description(&self) -> &'static str {
        "Create an operation and run it in the background"
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
        _out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let runtime = interp.runtime();
        let operation = runtime.prepare_operation(&args[0], &args[1..])?;
        runtime.execute_background(operation)?;
        Ok(true)
    }
}

pub struct OperationWaitBgCommand;

#[async_trait]
impl Command for OperationWaitBgCommand {
    fn name(&self) -> &'static str {
        "operationWaitBg"
    }

    fn description(&self) -> &'static str {
        "Wait for all background operations"
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
        for operation in interp.runtime().wait_background().await? {
            writeln!(out, "{}", operation)?;
        }
        Ok(true)
    }
}

pub struct OperationExecuteAgainCommand;

#[async_trait]
impl Command for OperationExecuteAgainCommand {
    fn name(&self) -> &'static str {
        "operationExecuteAgain"
    }

    fn description(&self) -> &'static str {
        "Run the last operation again"
    }

    fn usage(&self) -> &'static str {
        "[resetAnswer]"
    }

    fn arity(&self) -> Arity {
        Arity::range(0, 1)
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        _out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let reset = args.first().map(|arg| parse_flag(arg)).transpose()?.unwrap_or(false);
        interp.runtime().execute_again(reset).await?;
        Ok(true)
    }
}

pub struct OperationInfoCommand;

#[async_trait]
impl Command for OperationInfoCommand {
    fn name(&self) -> &'static str {
        "operationInfo"
    }

    fn description(&self) -> &'static str {
        "Describe the last operation"
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
        writeln!(out, "{}", last_operation(interp)?)?;
        Ok(true)
    }
}

/// Prints the answer of the last operation, one value per line by default.
pub struct OperationAnswerCommand;

#[async_trait]
impl Command for OperationAnswerCommand {
    fn name(&self) -> &'static str {
        "operationAnswer"
    }

    fn description(&self) -> &'static str {
        "Print the answer of the last operation"
    }

    fn usage(&self) -> &'static str {
        "[separator]"
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
        let operation = last_operation(interp)?;
        let separator = args.first().map(String::as_str).unwrap_or("\n");
        let text = operation
            .answer()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(separator);
        writeln!(out, "{}", text)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::{interpreter, run};
    use crate::error::ErrorKind;
    use crate::executor::Interpreter;

    async fn storage_with(records: &[&str]) -> Interpreter {
        let interp = interpreter();
        run(&interp, "algorithmStart", &["MemoryStorage"]).await.0.unwrap();
        let signature = format!(
            "List({})",
            records
                .iter()
                .map(|r| format!("\"{}\"", r))
                .collect::<Vec<_>>()
                .join(", ")
        );
        run(&interp, "namedInstanceAdd", &[&signature, "records"]).await.0.unwrap();
        run(&interp, "operationExecute", &["Insert", "records"]).await.0.unwrap();
        interp
    }

    #[tokio::test]
    async fn test_execute_and_answer() {
        let interp = storage_with(&["red", "green", "blue"]).await;

        let (result, _) = run(&interp, "operationExecute", &["Search", "re"]).await;
        assert!(result.unwrap());
        let (_, out) = run(&interp, "operationAnswer", &[","]).await;
        assert_eq!(out, "red,green\n");

        let (_, out) = run(&interp, "operationInfo", &[]).await;
        assert!(out.starts_with("Search (executions: 1, answer size: 2"));
    }

    #[tokio::test]
    async fn test_execute_again_accumulates_or_resets() {
        let interp = storage_with(&["a", "b"]).await;
        run(&interp, "operationExecute", &["Count"]).await.0.unwrap();

        run(&interp, "operationExecuteAgain", &[]).await.0.unwrap();
        let (_, out) = run(&interp, "operationAnswer", &[" "]).await;
        assert_eq!(out, "2 2\n");

        run(&interp, "operationExecuteAgain", &["true"]).await.0.unwrap();
        let (_, out) = run(&interp, "operationAnswer", &[]).await;
        assert_eq!(out, "2\n");
    }

    #[tokio::test]
    async fn test_background_operations() {
        let interp = storage_with(&["x"]).await;
        run(&interp, "operationBgExecute", &["Count"]).await.0.unwrap();
        run(&interp, "operationBgExecute", &["Get", "0"]).await.0.unwrap();

        let (result, out) = run(&interp, "operationWaitBg", &[]).await;
        assert!(result.unwrap());
        assert_eq!(out.lines().count(), 2);
        assert_eq!(interp.runtime().background_count(), 0);
    }

    #[tokio::test]
    async fn test_prepare_only() {
        let interp = interpreter();
        let (result, _) = run(&interp, "operationPrepare", &["Get", "4"]).await;
        assert!(result.unwrap());
        let (_, out) = run(&interp, "operationInfo", &[]).await;
        assert!(out.starts_with("Get (executions: 0"));
    }

    #[tokio::test]
    async fn test_operation_errors() {
        let interp = interpreter();
        let (result, _) = run(&interp, "operationInfo", &[]).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::IllegalState);

        let (result, _) = run(&interp, "operationExecute", &["Count"]).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::IllegalState);

        let interp = storage_with(&["only"]).await;
        let (result, _) = run(&interp, "operationExecute", &["Get", "5"]).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NoSuchElement);

        let (result, _) = run(&interp, "operationExecuteAgain", &["perhaps"]).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::IllegalArgument);
    }
}
