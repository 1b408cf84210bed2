//! Tracing setup and the `loggingLevel` command.

use async_trait::async_trait;
use std::io::Write;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use ctlrun_core::registry::{Arity, Command};
use ctlrun_core::{CommandError, Interpreter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,ctlrun=debug,ctlrun_core=debug";

/// Handle for replacing the active filter at runtime.
pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Initialize tracing with a reloadable `EnvFilter`.
pub fn init_tracing() -> FilterHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    handle
}

/// Shows or replaces the log filter.
pub struct LoggingLevelCommand {
    handle: FilterHandle,
}

impl LoggingLevelCommand {
    pub fn new(handle: FilterHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl Command for LoggingLevelCommand {
    fn name(&self) -> &'static str {
        "loggingLevel"
    }

    fn description(&self) -> &'static str {
        "Show or set the log filter (e.g. debug, info,ctlrun_core=trace)"
    }

    fn usage(&self) -> &'static str {
        "[filter]"
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
        if let Some(directives) = args.first() {
            let filter = EnvFilter::try_new(directives).map_err(|e| {
                CommandError::IllegalArgument(format!("invalid log filter '{}': {}", directives, e))
            })?;
            self.handle
                .reload(filter)
                .map_err(|e| CommandError::IllegalState(format!("Failed to reload log filter: {}", e)))?;
            tracing::info!(filter = %directives, "Log filter changed");
        }

        let current = self
            .handle
            .with_current(|filter| filter.to_string())
            .map_err(|e| CommandError::IllegalState(format!("Failed to read log filter: {}", e)))?;
        writeln!(out, "{}", current)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctlrun_core::create_default_registry;

    fn interpreter_with_logging() -> (Interpreter, reload::Layer<EnvFilter, Registry>) {
        let (layer, handle) = reload::Layer::new(EnvFilter::new("info"));
        let mut registry = create_default_registry();
        registry.register(LoggingLevelCommand::new(handle));
        (Interpreter::new(registry), layer)
    }

    async fn run(interp: &Interpreter, args: &[&str]) -> (Result<bool, CommandError>, String) {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut out: Vec<u8> = Vec::new();
        let result = interp.run_command("loggingLevel", &mut out, &args).await;
        (result, String::from_utf8_lossy(&out).into_owned())
    }

    #[tokio::test]
    async fn test_show_and_set_filter() {
        let (interp, _layer) = interpreter_with_logging();

        let (result, out) = run(&interp, &[]).await;
        assert!(result.unwrap());
        assert_eq!(out.trim(), "info");

        let (result, out) = run(&interp, &["warn,ctlrun_core=trace"]).await;
        assert!(result.unwrap());
        assert!(out.contains("ctlrun_core=trace"));
    }

    #[tokio::test]
    async fn test_invalid_filter() {
        let (interp, _layer) = interpreter_with_logging();
        let (result, _) = run(&interp, &["ctlrun=loud"]).await;
        assert!(result.is_err());
    }
}
