use serde::{Deserialize, Serialize};

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// `tracing` filter directive for the workspace crates at this level.
    pub fn directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "strands=trace,strands_agent=trace",
            LogLevel::Debug => "strands=debug,strands_agent=debug",
            LogLevel::Info => "strands=info,strands_agent=info",
            LogLevel::Warn => "strands=warn,strands_agent=warn",
            LogLevel::Error => "strands=error,strands_agent=error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}
