use anyhow::{Context, Result};
use shcall_config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Install the stderr subscriber.
///
/// `RUST_LOG` takes precedence over the configured `[logging]` section.
pub(crate) fn initialize_tracing(logging: &LoggingConfig) -> Result<()> {
    let env_filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        let directives = logging.filter_directives();
        EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid logging filter '{directives}'"))?
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let init_result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
    if let Err(err) = init_result {
        tracing::warn!(error = %err, "tracing already initialized; skipping setup");
    }
    Ok(())
}
