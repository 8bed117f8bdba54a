use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::constants::{CONFIG_FILE_NAME, CONFIG_PATH_ENV, USER_CONFIG_DIR};
use crate::loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};
use crate::root::ShcallConfig;

/// The files a configuration is assembled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub user_file: Option<PathBuf>,
    pub workspace_root: PathBuf,
    pub explicit_file: Option<PathBuf>,
}

impl ConfigPaths {
    /// Standard locations for `workspace_root`.
    ///
    /// Without an `explicit_file`, `SHCALL_CONFIG_PATH` is consulted.
    pub fn discover(workspace_root: impl Into<PathBuf>, explicit_file: Option<PathBuf>) -> Self {
        let explicit_file = explicit_file.or_else(|| {
            std::env::var(CONFIG_PATH_ENV)
                .ok()
                .map(|path| path.trim().to_owned())
                .filter(|path| !path.is_empty())
                .map(PathBuf::from)
        });
        Self {
            user_file: dirs::config_dir()
                .map(|dir| dir.join(USER_CONFIG_DIR).join(CONFIG_FILE_NAME)),
            workspace_root: workspace_root.into(),
            explicit_file,
        }
    }

    pub fn workspace_file(&self) -> PathBuf {
        self.workspace_root.join(CONFIG_FILE_NAME)
    }
}

/// Loads, merges and validates configuration layers.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: ShcallConfig,
    layer_stack: ConfigLayerStack,
}

impl ConfigManager {
    /// Load from the standard locations around the current directory.
    pub fn load(explicit_file: Option<PathBuf>) -> Result<Self> {
        let workspace = std::env::current_dir().context("Failed to resolve current directory")?;
        Self::load_from_paths(&ConfigPaths::discover(workspace, explicit_file))
    }

    /// Load the user and workspace layers for `workspace`.
    pub fn load_from_workspace(workspace: impl AsRef<Path>) -> Result<Self> {
        Self::load_from_paths(&ConfigPaths::discover(workspace.as_ref(), None))
    }

    pub fn load_from_paths(paths: &ConfigPaths) -> Result<Self> {
        let mut layer_stack = ConfigLayerStack::default();

        if let Some(user_file) = &paths.user_file {
            Self::push_optional(
                &mut layer_stack,
                ConfigLayerSource::User {
                    file: user_file.clone(),
                },
            );
        }

        let workspace_file = paths.workspace_file();
        if paths.explicit_file.as_deref() != Some(workspace_file.as_path()) {
            Self::push_optional(
                &mut layer_stack,
                ConfigLayerSource::Workspace {
                    file: workspace_file,
                },
            );
        }

        if let Some(explicit_file) = &paths.explicit_file {
            let toml = Self::load_toml_from_file(explicit_file)?;
            layer_stack.push(ConfigLayerEntry::new(
                ConfigLayerSource::Explicit {
                    file: explicit_file.clone(),
                },
                toml,
            ));
        }

        let config = if layer_stack.is_empty() {
            ShcallConfig::default()
        } else {
            layer_stack
                .effective_config()
                .try_into()
                .context("Failed to deserialize effective configuration")?
        };
        config
            .validate()
            .context("Configuration failed validation")?;

        for layer in layer_stack.layers() {
            tracing::debug!(source = %layer.source, "loaded configuration layer");
        }

        Ok(Self {
            config,
            layer_stack,
        })
    }

    /// Implicit layers are skipped when missing or unreadable.
    fn push_optional(stack: &mut ConfigLayerStack, source: ConfigLayerSource) {
        let file = source.file();
        if !file.exists() {
            return;
        }
        match Self::load_toml_from_file(file) {
            Ok(toml) => stack.push(ConfigLayerEntry::new(source, toml)),
            Err(err) => {
                tracing::warn!(source = %source, error = %format!("{err:#}"), "ignoring configuration layer");
            }
        }
    }

    fn load_toml_from_file(path: &Path) -> Result<toml::Value> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let value: toml::Value = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(value)
    }

    pub fn config(&self) -> &ShcallConfig {
        &self.config
    }

    pub fn into_config(self) -> ShcallConfig {
        self.config
    }

    pub fn layer_stack(&self) -> &ConfigLayerStack {
        &self.layer_stack
    }

    /// The highest-precedence file that contributed, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.layer_stack
            .layers()
            .last()
            .map(|layer| layer.source.file())
    }

    pub fn effective_config(&self) -> toml::Value {
        self.layer_stack.effective_config()
    }
}
