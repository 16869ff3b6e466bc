//! Turbofan Failure-Risk Service - Main Entry Point

use api::{init_logging, run_server, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    init_logging(&config)?;

    info!("=== Turbofan Failure-Risk Service v{} ===", env!("CARGO_PKG_VERSION"));
    config.log_config();

    run_server(config).await
}
