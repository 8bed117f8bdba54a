use std::fmt;
use std::path::{Path, PathBuf};

use crate::loader::merge_toml_values;

/// Where a configuration layer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// The user's file, e.g. `~/.config/shcall/shcall.toml`.
    User { file: PathBuf },
    /// `shcall.toml` in the workspace root.
    Workspace { file: PathBuf },
    /// A file named by `--config` or `SHCALL_CONFIG_PATH`.
    Explicit { file: PathBuf },
}

impl ConfigLayerSource {
    pub fn file(&self) -> &Path {
        match self {
            Self::User { file } | Self::Workspace { file } | Self::Explicit { file } => file,
        }
    }
}

impl fmt::Display for ConfigLayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::User { .. } => "user",
            Self::Workspace { .. } => "workspace",
            Self::Explicit { .. } => "explicit",
        };
        write!(f, "{kind} ({})", self.file().display())
    }
}

/// One parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayerEntry {
    pub source: ConfigLayerSource,
    pub config: toml::Value,
}

impl ConfigLayerEntry {
    pub fn new(source: ConfigLayerSource, config: toml::Value) -> Self {
        Self { source, config }
    }
}

/// Configuration layers, ordered from lowest to highest precedence.
#[derive(Debug, Clone, Default)]
pub struct ConfigLayerStack {
    layers: Vec<ConfigLayerEntry>,
}

impl ConfigLayerStack {
    pub fn push(&mut self, layer: ConfigLayerEntry) {
        self.layers.push(layer);
    }

    /// Merge every layer into one document.
    pub fn effective_config(&self) -> toml::Value {
        let mut merged = toml::Value::Table(toml::Table::new());
        for layer in &self.layers {
            merge_toml_values(&mut merged, &layer.config);
        }
        merged
    }

    pub fn layers(&self) -> &[ConfigLayerEntry] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
