use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::invocation::InvocationDefaults;
use crate::logging::LoggingConfig;

/// The effective `shcall` configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShcallConfig {
    #[serde(default)]
    pub defaults: InvocationDefaults,
    /// Variables added to the environment of every spawned process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ShcallConfig {
    pub fn validate(&self) -> Result<()> {
        self.defaults
            .validate()
            .context("Invalid [defaults] section")?;
        self.logging.validate().context("Invalid [logging] section")?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
