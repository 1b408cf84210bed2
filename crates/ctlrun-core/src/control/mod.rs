//! Control files and action descriptors.

mod descriptor;
mod file;

pub use descriptor::{
    read_arguments, read_method_name, read_modifier, unquote, ActionDescriptor, Modifier,
};
pub use file::ControlFile;

/// Action run when a control file is started without naming one.
pub const DEFAULT_ACTION: &str = "actions";
