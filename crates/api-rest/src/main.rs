//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging of the HTTP surface. The workspace's main
//! `referra-run` binary serves the same router.

use api_rest::{AppState, RestConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the Referra REST API server
///
/// Configuration comes from `REFERRA_*` environment variables; see [`RestConfig::from_env`].
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - configuration is invalid or a store cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = RestConfig::from_env()?;
    tracing::info!("-- Starting Referra REST API on {}", cfg.addr);

    let state = AppState::from_config(&cfg)?;
    api_rest::serve(&cfg.addr, state).await
}
