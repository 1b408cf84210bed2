//! Error types for actions, primitives and control files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of an error kind.
///
/// Kinds are what `repeatUntilException` and `ignoreException` modifiers
/// match against, so every [`CommandError`] maps onto exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A source (stream, collection) has no more elements.
    NoSuchElement,
    /// An argument could not be interpreted.
    IllegalArgument,
    /// The runtime is not in a state that allows the call.
    IllegalState,
    /// The target does not support the requested operation shape.
    NoSuchMethod,
    /// A signature could not be resolved to a constructible type.
    NoSuchInstantiator,
    /// A constructor or factory failed.
    Instantiation,
    /// A named entity (instance, algorithm, file) does not exist.
    NotFound,
    /// I/O failure.
    Io,
    /// The call was interrupted by shutdown.
    Interrupted,
    /// Any other runtime failure.
    Runtime,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::NoSuchElement,
        ErrorKind::IllegalArgument,
        ErrorKind::IllegalState,
        ErrorKind::NoSuchMethod,
        ErrorKind::NoSuchInstantiator,
        ErrorKind::Instantiation,
        ErrorKind::NotFound,
        ErrorKind::Io,
        ErrorKind::Interrupted,
        ErrorKind::Runtime,
    ];

    /// Canonical identifier of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoSuchElement => "NoSuchElement",
            ErrorKind::IllegalArgument => "IllegalArgument",
            ErrorKind::IllegalState => "IllegalState",
            ErrorKind::NoSuchMethod => "NoSuchMethod",
            ErrorKind::NoSuchInstantiator => "NoSuchInstantiator",
            ErrorKind::Instantiation => "Instantiation",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Io => "Io",
            ErrorKind::Interrupted => "Interrupted",
            ErrorKind::Runtime => "Runtime",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an error-kind identifier is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown error kind: {0}")]
pub struct UnknownErrorKind(pub String);

impl FromStr for ErrorKind {
    type Err = UnknownErrorKind;

    /// Accepts the canonical name case-insensitively, optionally suffixed
    /// with `Exception` or `Error` (`NoSuchElementException`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let base = lower
            .strip_suffix("exception")
            .or_else(|| lower.strip_suffix("error"))
            .unwrap_or(&lower);

        ErrorKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(base))
            .ok_or_else(|| UnknownErrorKind(trimmed.to_string()))
    }
}

/// Errors raised by primitives and propagated through action blocks.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("No such method: {0}")]
    NoSuchMethod(String),

    #[error("No such instantiator: {0}")]
    NoSuchInstantiator(String),

    #[error("Instantiation failed: {0}")]
    Instantiation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Interrupted: {0}")]
    Interrupted(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl CommandError {
    /// Build an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::NoSuchElement => CommandError::NoSuchElement(message),
            ErrorKind::IllegalArgument => CommandError::IllegalArgument(message),
            ErrorKind::IllegalState => CommandError::IllegalState(message),
            ErrorKind::NoSuchMethod => CommandError::NoSuchMethod(message),
            ErrorKind::NoSuchInstantiator => CommandError::NoSuchInstantiator(message),
            ErrorKind::Instantiation => CommandError::Instantiation(message),
            ErrorKind::NotFound => CommandError::NotFound(message),
            ErrorKind::Io => CommandError::Io(message),
            ErrorKind::Interrupted => CommandError::Interrupted(message),
            ErrorKind::Runtime => CommandError::Runtime(message),
        }
    }

    /// Kind of this error, used for policy matching.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::NoSuchElement(_) => ErrorKind::NoSuchElement,
            CommandError::IllegalArgument(_) => ErrorKind::IllegalArgument,
            CommandError::IllegalState(_) => ErrorKind::IllegalState,
            CommandError::NoSuchMethod(_) => ErrorKind::NoSuchMethod,
            CommandError::NoSuchInstantiator(_) => ErrorKind::NoSuchInstantiator,
            CommandError::Instantiation(_) => ErrorKind::Instantiation,
            CommandError::NotFound(_) => ErrorKind::NotFound,
            CommandError::Io(_) => ErrorKind::Io,
            CommandError::Interrupted(_) => ErrorKind::Interrupted,
            CommandError::Runtime(_) => ErrorKind::Runtime,
        }
    }
}

impl From<std::io::Error> for CommandError {
    fn from(e: std::io::Error) -> Self {
        CommandError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::Runtime(e.to_string())
    }
}

/// Errors raised while loading a control file.
#[derive(Debug, Error)]
pub enum ControlFileError {
    #[error("Cannot read control file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced by a top-level control-file run.
///
/// Ordinary action failures are reported on the output stream and turn into
/// `Ok(false)`; only these escape the interpreter.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    ControlFile(#[from] ControlFileError),

    /// An error escaped an invocation that was not allowed to raise one.
    #[error("Internal consistency error in action '{action}': {source}")]
    Internal {
        action: String,
        #[source]
        source: CommandError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommandError::NotFound("stream1".to_string());
        assert_eq!(err.to_string(), "Not found: stream1");

        let err = CommandError::new(ErrorKind::NoSuchElement, "end of stream");
        assert_eq!(err.to_string(), "No such element: end of stream");
    }

    #[test]
    fn test_error_kind_roundtrip() {
        for kind in ErrorKind::ALL {
            assert_eq!(CommandError::new(kind, "x").kind(), kind);
        }
    }

    #[test]
    fn test_error_kind_parse() {
        assert_eq!("NoSuchElement".parse::<ErrorKind>(), Ok(ErrorKind::NoSuchElement));
        assert_eq!(
            "NoSuchElementException".parse::<ErrorKind>(),
            Ok(ErrorKind::NoSuchElement)
        );
        assert_eq!("ioerror".parse::<ErrorKind>(), Ok(ErrorKind::Io));
        assert_eq!(
            "Bogus".parse::<ErrorKind>(),
            Err(UnknownErrorKind("Bogus".to_string()))
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CommandError = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
