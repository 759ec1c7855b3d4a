//! Agent configuration
//!
//! Values come from an optional file named by `IRRIGATION_CONFIG` and from
//! `IRRIGATION_*` environment variables, with `__` separating nested keys
//! (e.g. `IRRIGATION_ENGINE__HYSTERESIS__ON_THRESHOLD=0.8`).

use anyhow::{Context, Result};
use irrigation_engine::EngineConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Environment variable naming an optional configuration file
pub const CONFIG_FILE_ENV: &str = "IRRIGATION_CONFIG";

const ENV_PREFIX: &str = "IRRIGATION";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Site label attached to every log event
    pub site_name: String,

    /// API server port
    pub api_port: u16,

    /// Saved model to load at startup; trained from scratch when absent
    pub model_path: Option<PathBuf>,

    /// Write a freshly trained model to `model_path`
    pub persist_model: bool,

    pub engine: EngineConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            site_name: "default".to_string(),
            api_port: 8080,
            model_path: None,
            persist_model: true,
            engine: EngineConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment and config file
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);
        Self::from_sources(file, None)
    }

    /// Build from an optional file and environment; `env` overrides the
    /// process environment when given
    pub fn from_sources(
        file: Option<PathBuf>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = &file {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: AgentConfig = builder
            .build()
            .context("Failed to read agent configuration")?
            .try_deserialize()
            .context("Invalid agent configuration")?;

        config
            .engine
            .validate()
            .context("Invalid engine configuration")?;
        Ok(config)
    }
}
