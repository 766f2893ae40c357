use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use lis_core::CoreConfig;

/// Main entry point for the LIS application
///
/// Starts the REST server on port 3000 (configurable via LIS_REST_ADDR).
/// The Swagger UI is served at `/swagger-ui`.
///
/// # Environment Variables
/// - `LIS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `LIS_RANGE_CATALOG`: Path to a YAML reference range catalog (default: built-in)
/// - `LIS_PHYSIOLOGIC_LIMITS`: Path to a YAML physiologic limit table (default: built-in)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If startup or runtime fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("lis=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("LIS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = load_config()?;
    tracing::info!(
        catalog_entries = cfg.catalog().len(),
        "++ Starting LIS REST on {}",
        rest_addr
    );

    let app = api_rest::router(AppState::new(Arc::new(cfg)));

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the core configuration, loading the range catalog and physiologic
/// limit table from YAML files when the corresponding environment variables
/// are set.
fn load_config() -> anyhow::Result<CoreConfig> {
    let catalog = match std::env::var("LIS_RANGE_CATALOG") {
        Ok(path) => lis_core::RangeCatalog::from_yaml_str(&std::fs::read_to_string(&path)?)?,
        Err(_) => lis_core::RangeCatalog::builtin(),
    };
    let limits = match std::env::var("LIS_PHYSIOLOGIC_LIMITS") {
        Ok(path) => {
            lis_core::PhysiologicLimitTable::from_yaml_str(&std::fs::read_to_string(&path)?)?
        }
        Err(_) => lis_core::PhysiologicLimitTable::builtin(),
    };
    Ok(CoreConfig::new(catalog, limits))
}
