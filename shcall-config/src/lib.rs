//! Configuration for the `shcall` front end.
//!
//! Settings are read from up to three TOML layers, lowest precedence first:
//! the user file under the platform config directory, `shcall.toml` in the
//! workspace root, and an explicitly named file (`--config` or
//! `SHCALL_CONFIG_PATH`). Tables merge recursively and scalar values of a
//! later layer replace earlier ones.
//!
//! ```toml
//! [defaults]
//! check = true
//! timeout_seconds = 30
//!
//! [env]
//! LC_ALL = "C"
//!
//! [logging]
//! level = "info"
//! targets = ["shcall_runner=debug"]
//! ```

pub mod constants;
pub mod invocation;
pub mod loader;
pub mod logging;
pub mod root;

pub use invocation::InvocationDefaults;
pub use loader::layers::{ConfigLayerEntry, ConfigLayerSource, ConfigLayerStack};
pub use loader::{ConfigManager, ConfigPaths, merge_toml_values};
pub use logging::LoggingConfig;
pub use root::ShcallConfig;
