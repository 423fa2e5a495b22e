use std::str::FromStr;

use color_eyre::eyre::{Result, eyre};
use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_str_config(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

pub fn parse_level(s: &str) -> Result<Level> {
    Level::from_str(s).map_err(|_| eyre!("unknown log level `{s}`"))
}

/// Installs the global subscriber. Logs go to stderr so reports on stdout
/// stay machine-readable.
pub fn init(level: Level, format: LogFormat) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.with_ansi(false).json().finish())
        }
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}
