use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use title_classifier::{
    config::Config,
    services::training::{self, TrainingOptions},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let options = TrainingOptions::from(&config);

    let summary = training::run(&options)
        .await
        .context("Training run aborted")?;

    println!();
    println!("Rows: {} (train {}, test {})", summary.rows, summary.train_rows, summary.test_rows);
    println!("Accuracy: {:.6}", summary.report.accuracy);
    println!();
    println!("{}", summary.report);
    println!("Artifacts saved in: {}", options.artifacts_dir.display());
    println!("Database saved at: {}", config.database_path.display());

    Ok(())
}
