use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// `verbose` switch. Logs go to stderr; stdout carries the JSON result.
pub fn init(verbose: bool) -> Result<()> {
    let fallback = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}
