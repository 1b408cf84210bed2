//! Process configuration.

use serde::Deserialize;

use ctlrun_core::control::DEFAULT_ACTION;

/// Configuration loaded from environment variables.
///
/// Environment variables are prefixed with `CTLRUN_`:
/// - `CTLRUN_HOST`: bind address of the shell and HTTP listeners (default: "0.0.0.0")
/// - `CTLRUN_SHELL_PORT`: socket shell port when none is given on the command line
/// - `CTLRUN_HTTP_PORT`: enables the HTTP front-end on this port
/// - `CTLRUN_PROMPT`: shell prompt (default: "ctlrun >>> ")
/// - `CTLRUN_DEFAULT_ACTION`: action run when none is named (default: "actions")
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub shell_port: Option<u16>,

    #[serde(default)]
    pub http_port: Option<u16>,

    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default = "default_action")]
    pub default_action: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_prompt() -> String {
    "ctlrun >>> ".to_string()
}

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

impl AppConfig {
    /// Load configuration from `CTLRUN_*` environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from explicit key/value pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("CTLRUN_").from_iter::<_, AppConfig>(vars)
    }

    /// Address for `TcpListener::bind` on `port`.
    pub fn bind_address(&self, port: u16) -> String {
        format!("{}:{}", self.host, port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            shell_port: None,
            http_port: None,
            prompt: default_prompt(),
            default_action: default_action(),
        }
    }
}
