//! Feature engineering entry point: raw sensor CSV -> labeled training CSV

use feature_engine::{create_features, PipelineConfig};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = PipelineConfig::load()?;
    config.log_config();

    let summary = create_features(
        &config.raw_path,
        &config.processed_path,
        config.rul_threshold,
    )?;
    info!(
        "Feature engineering complete: {} rows, {} engines",
        summary.rows, summary.engines
    );

    Ok(())
}
