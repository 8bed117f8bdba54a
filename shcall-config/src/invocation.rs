use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Process options applied to every invocation unless overridden.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InvocationDefaults {
    /// Raise on non-zero exit status or termination by signal.
    #[serde(default = "InvocationDefaults::default_check")]
    pub check: bool,
    /// Wait timeout in seconds; `0` waits forever.
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Run commands through `sh -c`.
    #[serde(default)]
    pub shell: bool,
    /// Working directory for spawned processes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl Default for InvocationDefaults {
    fn default() -> Self {
        Self {
            check: Self::default_check(),
            timeout_seconds: 0,
            shell: false,
            cwd: None,
        }
    }
}

impl InvocationDefaults {
    const fn default_check() -> bool {
        true
    }

    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_seconds))
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(cwd) = &self.cwd {
            ensure!(
                !cwd.as_os_str().is_empty(),
                "defaults.cwd must not be empty when set"
            );
        }
        Ok(())
    }
}
