use anyhow::Result;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use shcall_config::{ConfigManager, ConfigPaths, ShcallConfig};
use std::time::Duration;

#[test]
fn workspace_file_configures_invocation_defaults() -> Result<()> {
    let workspace = TempDir::new()?;
    workspace.child("shcall.toml").write_str(
        r#"
[defaults]
check = false
timeout_seconds = 30
cwd = "/tmp"

[env]
LC_ALL = "C"

[logging]
level = "info"
targets = ["shcall_runner=debug"]
"#,
    )?;

    let paths = ConfigPaths {
        user_file: None,
        workspace_root: workspace.path().to_path_buf(),
        explicit_file: None,
    };
    let config = ConfigManager::load_from_paths(&paths)?.into_config();

    assert!(!config.defaults.check);
    assert_eq!(config.defaults.timeout(), Some(Duration::from_secs(30)));
    assert_eq!(config.env.get("LC_ALL").map(String::as_str), Some("C"));
    assert_eq!(
        config.logging.filter_directives(),
        "info,shcall_runner=debug"
    );
    Ok(())
}

#[test]
fn effective_configuration_prints_as_toml() -> Result<()> {
    let text = ShcallConfig::default().to_toml_string()?;
    assert!(text.contains("[defaults]"));
    assert!(text.contains("check = true"));
    assert!(text.contains("[logging]"));
    assert!(text.contains("level = \"warn\""));
    Ok(())
}
