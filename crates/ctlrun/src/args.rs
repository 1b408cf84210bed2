//! Command-line arguments.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use ctlrun_core::Variables;

/// ctlrun [port] [controlFile] [action] [name=value...]
#[derive(Parser, Debug)]
#[command(name = "ctlrun")]
#[command(version, about = "Control-file action interpreter", long_about = None)]
pub struct Cli {
    /// Optional shell port, control file, action and name=value variables
    #[arg(
        value_name = "ARGS",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub args: Vec<String>,
}

/// Positional arguments sorted into their roles.
#[derive(Debug, Default)]
pub struct Invocation {
    pub port: Option<u16>,
    pub control_file: Option<PathBuf>,
    pub action: Option<String>,
    pub variables: Variables,
}

impl Invocation {
    /// Interpret positional arguments.
    ///
    /// A leading integer is the shell port. `name=value` arguments set
    /// variables anywhere in the list. The first remaining argument is the
    /// control file; every later one replaces the action, so the last wins.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut invocation = Invocation::default();
        let mut rest = args;

        if let Some((first, tail)) = args.split_first() {
            if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
                invocation.port = Some(first.parse()?);
                rest = tail;
            }
        }

        for arg in rest {
            if invocation.variables.assign(arg) {
                continue;
            }
            if invocation.control_file.is_none() {
                invocation.control_file = Some(PathBuf::from(arg));
            } else {
                invocation.action = Some(arg.clone());
            }
        }

        Ok(invocation)
    }
}
