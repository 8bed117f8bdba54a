/// File name looked up in the workspace root and the user config directory.
pub const CONFIG_FILE_NAME: &str = "shcall.toml";

/// Subdirectory of the platform config directory holding the user file.
pub const USER_CONFIG_DIR: &str = "shcall";

/// Environment variable naming an explicit configuration file.
pub const CONFIG_PATH_ENV: &str = "SHCALL_CONFIG_PATH";

pub const DEFAULT_LOG_LEVEL: &str = "warn";

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
