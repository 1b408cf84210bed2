//! Built-in primitive commands.
//!
//! - general: `help`, `echo`, `sleep`, `currentTime`, `controlFile`, `fail`, `quit`
//! - algorithms: `algorithmStart`, `algorithmStop`, `algorithmSelect`,
//!   `algorithmList`, `algorithmInfo`
//! - operations: `operationPrepare`, `operationExecute`, `operationBgExecute`,
//!   `operationWaitBg`, `operationExecuteAgain`, `operationInfo`, `operationAnswer`
//! - named instances: `namedInstanceAdd`, `namedInstanceReplace`,
//!   `namedInstanceRemove`, `namedInstanceList`, `namedInstanceEcho`
//! - object streams: `objectStreamOpen`, `objectStreamClose`, `objectStreamReset`
//! - statistics: `statisticsGet`, `statisticsReset`

mod algorithm;
mod general;
mod instance;
mod operation;
mod statistics;
mod stream;

pub use self::algorithm::{
    AlgorithmInfoCommand, AlgorithmListCommand, AlgorithmSelectCommand, AlgorithmStartCommand,
    AlgorithmStopCommand,
};
pub use self::general::{
    ControlFileCommand, CurrentTimeCommand, EchoCommand, FailCommand, HelpCommand, QuitCommand,
    SleepCommand,
};
pub use self::instance::{
    NamedInstanceAddCommand, NamedInstanceEchoCommand, NamedInstanceListCommand,
    NamedInstanceRemoveCommand, NamedInstanceReplaceCommand,
};
pub use self::operation::{
    OperationAnswerCommand, OperationBgExecuteCommand, OperationExecuteAgainCommand,
    OperationExecuteCommand, OperationInfoCommand, OperationPrepareCommand, OperationWaitBgCommand,
};
pub use self::statistics::{StatisticsGetCommand, StatisticsResetCommand};
pub use self::stream::{ObjectStreamCloseCommand, ObjectStreamOpenCommand, ObjectStreamResetCommand};

use crate::error::CommandError;
use crate::registry::CommandRegistry;

/// Create a command registry with all built-in commands registered.
pub fn create_default_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register(HelpCommand);
    registry.register(EchoCommand);
    registry.register(SleepCommand);
    registry.register(CurrentTimeCommand);
    registry.register(ControlFileCommand);
    registry.register(FailCommand);
    registry.register(QuitCommand);

    registry.register(AlgorithmStartCommand);
    registry.register(AlgorithmStopCommand);
    registry.register(AlgorithmSelectCommand);
    registry.register(AlgorithmListCommand);
    registry.register(AlgorithmInfoCommand);

    registry.register(OperationPrepareCommand);
    registry.register(OperationExecuteCommand);
    registry.register(OperationBgExecuteCommand);
    registry.register(OperationWaitBgCommand);
    registry.register(OperationExecuteAgainCommand);
    registry.register(OperationInfoCommand);
    registry.register(OperationAnswerCommand);

    registry.register(NamedInstanceAddCommand);
    registry.register(NamedInstanceReplaceCommand);
    registry.register(NamedInstanceRemoveCommand);
    registry.register(NamedInstanceListCommand);
    registry.register(NamedInstanceEchoCommand);

    registry.register(ObjectStreamOpenCommand);
    registry.register(ObjectStreamCloseCommand);
    registry.register(ObjectStreamResetCommand);

    registry.register(StatisticsGetCommand);
    registry.register(StatisticsResetCommand);

    registry
}

/// Parse a zero-based index argument.
fn parse_index(text: &str) -> Result<usize, CommandError> {
    text.trim()
        .parse()
        .map_err(|_| CommandError::IllegalArgument(format!("not an index: {}", text)))
}

/// Parse a boolean flag argument.
fn parse_flag(text: &str) -> Result<bool, CommandError> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(CommandError::IllegalArgument(format!("not a boolean: {}", text))),
    }
}
