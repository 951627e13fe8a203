//! Strands configuration system.
//!
//! Provides TOML-based configuration with full validation. All config
//! sections use defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use strands_config::{load_config, config_to_json};
//!
//! let config = load_config(None).expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    AgentConfig, LogLevel, LoggingConfig, ModelConfig, ProviderKind, RetryConfig,
    StrandsConfig, CONFIG_SCHEMA_VERSION,
};

use std::path::Path;
use strands_common::ConfigError;

/// Load and validate config.
///
/// With `path`, the file must exist. Without it, `config.toml` is read from
/// the OS config directory and a commented default is created if missing.
pub fn load_config(path: Option<&Path>) -> Result<StrandsConfig, ConfigError> {
    let config = match path {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };

    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &StrandsConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
