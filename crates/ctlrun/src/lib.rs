//! ctlrun
//!
//! Process front-ends for the control-file interpreter in `ctlrun-core`:
//!
//! - **Process entry**: `ctlrun [port] [controlFile] [action] [name=value...]`
//! - **Socket shell**: line-oriented TCP sessions running primitives
//! - **HTTP**: actions and primitives over axum
//!
//! ## Modules
//!
//! - [`args`]: Positional argument handling
//! - [`config`]: Configuration loading from environment variables
//! - [`error`]: Error types with Axum integration
//! - [`http`]: HTTP router and handlers
//! - [`logging`]: Tracing setup and the `loggingLevel` command
//! - [`shell`]: Socket shell server

pub mod args;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod shell;

pub use args::{Cli, Invocation};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
