use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, RestConfig};
use api_shared::HealthService;

/// Main entry point for the Referra application
///
/// Resolves configuration, opens the PHI document collection and the workflow database,
/// loads the sessions file, logs a startup health check and then serves the REST API.
///
/// # Environment Variables
/// - `REFERRA_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `REFERRA_DATA_DIR`: root of the PHI collection and default database (default: "referra_data")
/// - `REFERRA_WORKFLOW_DB`: workflow database path (default: `<data>/workflow.sqlite3`)
/// - `REFERRA_SESSIONS_FILE`: YAML sessions file (default: "sessions.yaml")
/// - `REFERRA_NAMESPACE`: deployment namespace (default: "referra.dev.1")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, store setup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("referra=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = RestConfig::from_env()?;
    let state = AppState::from_config(&cfg)?;

    let stores = state.service.health().await;
    let health = HealthService::check_health(
        &state.namespace,
        [
            ("phi", stores.phi_store),
            ("workflow", stores.workflow_store),
        ],
    );
    if health.ok {
        tracing::info!("++ {} ({})", health.message, health.namespace);
    } else {
        tracing::warn!("{} ({}): {:?}", health.message, health.namespace, health.stores);
    }

    tracing::info!("-- Starting Referra REST server on {}", cfg.addr);
    api_rest::serve(&cfg.addr, state).await
}
