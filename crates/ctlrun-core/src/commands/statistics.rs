//! Statistics commands.

use async_trait::async_trait;
use regex::Regex;
use std::io::Write;

use crate::error::CommandError;
use crate::executor::Interpreter;
use crate::registry::{Arity, Command};

const JSON_FLAG: &str = "--json";

pub struct StatisticsGetCommand;

#[async_trait]
impl Command for StatisticsGetCommand {
    fn name(&self) -> &'static str {
        "statisticsGet"
    }

    fn description(&self) -> &'static str {
        "Print statistics counters, optionally filtered by a regex"
    }

    fn usage(&self) -> &'static str {
        "[regex] [--json]"
    }

    fn arity(&self) -> Arity {
        Arity::range(0, 2)
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        out: &mut (dyn Write + Send),
        args: &[String],
    ) -> Result<bool, CommandError> {
        let json = args.iter().any(|arg| arg == JSON_FLAG);
        let filter = args
            .iter()
            .find(|arg| *arg != JSON_FLAG)
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| CommandError::IllegalArgument(format!("invalid regex '{}': {}", pattern, e)))
            })
            .transpose()?;

        let snapshot = interp.runtime().statistics().snapshot(filter.as_ref());
        if json {
            let map: serde_json::Map<String, serde_json::Value> = snapshot
                .into_iter()
                .map(|(name, value)| (name, serde_json::Value::from(value)))
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&map)?)?;
        } else {
            for (name, value) in snapshot {
                writeln!(out, "{} = {}", name, value)?;
            }
        }
        Ok(true)
    }
}

pub struct StatisticsResetCommand;

#[async_trait]
impl Command for StatisticsResetCommand {
    fn name(&self) -> &'static str {
        "statisticsReset"
    }

    fn description(&self) -> &'static str {
        "Reset all statistics counters"
    }

    fn arity(&self) -> Arity {
        Arity::NONE
    }

    async fn execute(
        &self,
        interp: &Interpreter,
        _out: &mut (dyn Write + Send),
        _args: &[String],
    ) -> Result<bool, CommandError> {
        interp.runtime().statistics().reset();
        Ok(true)
    }
}
