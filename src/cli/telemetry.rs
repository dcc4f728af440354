use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initialize the tracing subscriber for CLI runs.
///
/// `RUST_LOG` still takes precedence over the verbosity-derived default.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(level: Option<tracing::Level>) -> Result<()> {
    let default_level = level.unwrap_or(tracing::Level::ERROR);

    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let fmt_layer = fmt::layer().with_target(false);

    let subscriber = Registry::default().with(fmt_layer).with(env_filter);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
