//! Variable substitution module.
//!
//! Resolves `<name>` and `<name:default>` placeholders against a
//! [`Variables`](crate::context::Variables) environment.

mod engine;

pub use engine::{substitute, substitute_str};
