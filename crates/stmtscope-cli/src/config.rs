//! Configuration file support.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use stmtscope::prelude::ProxyConfig;

/// Contents of a `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Proxy settings.
    pub proxy: ProxySettings,
}

/// Overrides for [`ProxyConfig`]. Unset fields keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxySettings {
    pub batch_separator: Option<String>,
    pub result_set_label: Option<String>,
    pub generated_keys_label: Option<String>,
    pub max_sql_length: Option<usize>,
    pub capture_sql: Option<bool>,
}

impl CliConfig {
    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse TOML configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

impl ProxySettings {
    /// Apply the overrides on top of `config`.
    pub fn apply(&self, mut config: ProxyConfig) -> ProxyConfig {
        if let Some(separator) = &self.batch_separator {
            config = config.with_batch_separator(separator.clone());
        }
        if let Some(label) = &self.result_set_label {
            config = config.with_result_set_label(label.clone());
        }
        if let Some(label) = &self.generated_keys_label {
            config = config.with_generated_keys_label(label.clone());
        }
        if let Some(max) = self.max_sql_length {
            config = config.with_max_sql_length(max);
        }
        if let Some(capture) = self.capture_sql {
            config = config.with_capture_sql(capture);
        }
        config
    }
}
