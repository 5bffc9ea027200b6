//! Relay Bot - Main entry point.

use anyhow::Result;
use relay_bot::start;
use relay_common::config::Config;
use relay_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Missing credentials abort here, before any network activity.
    let config = Config::from_env()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Relay Bot v{}", env!("CARGO_PKG_VERSION"));

    start(config).await
}
