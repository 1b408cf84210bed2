//! Outcomes of a single loop iteration.

use crate::error::{CommandError, ErrorKind};

/// What an action loop does with an error raised by one iteration.
///
/// Errors double as control flow: a `repeatUntilException` match is the
/// normal way to end an unbounded loop, so the classification is explicit
/// instead of being left to the error value.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// Matched `repeatUntilException`: stop iterating, the action succeeds.
    Terminate(ErrorKind),
    /// Matched `ignoreException`: continue with the next iteration.
    Ignore(ErrorKind),
    /// The caller asked for errors: hand it to the enclosing loop.
    Propagate(CommandError),
    /// Report on the output stream and fail the action.
    Report(CommandError),
}

