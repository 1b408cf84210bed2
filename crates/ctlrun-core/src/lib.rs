//! ctlrun core library
//!
//! Interpreter for control files: property-style scripts of named actions
//! that drive a stateful runtime.
//!
//! This crate provides:
//! - Control-file parsing and lazy action descriptors
//! - `<name:default>` variable substitution
//! - Recursive action execution with loops, error policies, output
//!   redirection, postponement and background repetition
//! - Command registry with the built-in primitives
//! - Runtime: algorithms, operations, named instances, object streams,
//!   statistics and the shutdown signal

pub mod commands;
pub mod context;
pub mod control;
pub mod error;
pub mod executor;
pub mod output;
pub mod policy;
pub mod registry;
pub mod result;
pub mod runtime;
pub mod template;

pub use commands::create_default_registry;
pub use context::Variables;
pub use control::ControlFile;
pub use error::{CommandError, ControlFileError, EngineError, ErrorKind};
pub use executor::{Frame, Interpreter};
pub use registry::{Arity, Command, CommandRegistry};
pub use result::Disposition;
pub use runtime::{Runtime, Shutdown};
