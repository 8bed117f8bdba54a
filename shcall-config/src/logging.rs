use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_LOG_LEVEL, LOG_LEVELS};

/// Tracing filter used when `RUST_LOG` is not set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Global level: trace, debug, info, warn, error or off.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// Extra filter directives such as `shcall_runner=debug`.
    #[serde(default)]
    pub targets: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            targets: Vec::new(),
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        DEFAULT_LOG_LEVEL.to_owned()
    }

    /// The filter directive string, e.g. `warn,shcall_runner=debug`.
    pub fn filter_directives(&self) -> String {
        std::iter::once(self.level.as_str())
            .chain(self.targets.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            LOG_LEVELS.contains(&self.level.to_ascii_lowercase().as_str()),
            "logging.level must be one of {}, got '{}'",
            LOG_LEVELS.join(", "),
            self.level
        );
        ensure!(
            self.targets.iter().all(|target| !target.trim().is_empty()),
            "logging.targets must not contain empty directives"
        );
        Ok(())
    }
}
