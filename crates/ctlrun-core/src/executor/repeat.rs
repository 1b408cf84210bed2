//! Background re-execution of `repeatEvery` actions.

use std::sync::Arc;
use std::time::Duration;

use super::{Frame, Interpreter};
use crate::context::Variables;
use crate::control::ControlFile;
use crate::output::OutputFiles;

impl Interpreter {
    /// Start the background task of a `repeatEvery` action unless one is
    /// already registered under the action name.
    ///
    /// The task works on a copy of the frame's variables and output files
    /// taken now.
    pub(super) fn schedule_repeat(&self, frame: &Frame<'_>, action: &str, interval: Duration) {
        let mut repeats = match self.inner.repeats.lock() {
            Ok(repeats) => repeats,
            Err(e) => {
                tracing::error!(action = %action, error = %e, "Failed to acquire repeat registry lock");
                return;
            }
        };
        if repeats.contains_key(action) {
            return;
        }

        let interp = self.clone();
        let config = frame.config.clone();
        let variables = frame.variables.clone();
        let files = frame.files.clone();
        let name = action.to_string();
        let handle = tokio::spawn(async move {
            interp.repeat_loop(config, name, interval, variables, files).await
        });
        repeats.insert(action.to_string(), handle);

        tracing::info!(
            action = %action,
            interval_ms = interval.as_millis() as u64,
            "Scheduled repeating action"
        );
    }

    async fn repeat_loop(
        self,
        config: Arc<ControlFile>,
        action: String,
        interval: Duration,
        mut variables: Variables,
        files: OutputFiles,
    ) {
        let shutdown = self.shutdown().clone();
        let mut frame = Frame {
            config,
            variables: &mut variables,
            files,
        };

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let mut stdout = std::io::stdout();
            if let Err(e) = self.execute_action(&mut frame, &action, &mut stdout, false).await {
                tracing::error!(action = %action, error = %e, "Error escaped repeating action");
            }
        }

        tracing::debug!(action = %action, "Repeating action stopped");
    }

    /// Names of actions with a registered background task, sorted.
    pub fn repeating_actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .repeats
            .lock()
            .map(|repeats| repeats.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Wait for every background task to finish and clear the registry.
    ///
    /// Tasks only finish once the shutdown signal has fired.
    pub async fn join_repeats(&self) {
        let handles: Vec<_> = match self.inner.repeats.lock() {
            Ok(mut repeats) => repeats.drain().collect(),
            Err(_) => return,
        };
        for (action, handle) in handles {
            if let Err(e) = handle.await {
                tracing::warn!(action = %action, error = %e, "Repeating action task failed");
            }
        }
    }
}
