//! Training entry point: labeled CSV -> model, scaler and feature list

use feature_engine::PipelineConfig;
use model_trainer::{train_from_csv, TrainConfig};
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

    let outcome = train_from_csv(
        &config.processed_path,
        &config.models_dir,
        &TrainConfig::default(),
    )?;

    println!("{}", outcome.report);
    info!(
        "Training complete: run {} ({} training rows, {} hold-out rows)",
        outcome.bundle.run_id(),
        outcome.train_rows,
        outcome.test_rows
    );

    Ok(())
}
