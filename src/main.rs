use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use footfall_forecast::{
    AppConfig, DatasetSource, ModelCache, ModelSource, PersistedModel, PersistedModelSource,
    PredictionInput, SystemClock, ml::training,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "footfall-forecast")]
#[command(about = "Hourly footfall model trained on weather and time-of-week")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train on the configured datasets and report held-out metrics
    Train {
        /// Save the fitted model as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Score one hour
    Predict {
        #[arg(long, allow_negative_numbers = true)]
        temperature: f64,
        #[arg(long)]
        precipitation: f64,
        #[arg(long)]
        cloud_cover: f64,
        /// Hour of day (0-23)
        #[arg(long)]
        hour: i64,
        /// Day of week (0 = Monday)
        #[arg(long)]
        day_of_week: i64,
        /// Serve a saved model instead of training
        #[arg(long)]
        model: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("footfall_forecast=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    match args.command {
        Command::Train { output } => run_train(&config, output),
        Command::Predict {
            temperature,
            precipitation,
            cloud_cover,
            hour,
            day_of_week,
            model,
        } => {
            let input = PredictionInput {
                temperature,
                precipitation,
                cloud_cover,
                hour,
                day_of_week,
            };

            match model.or_else(|| config.model.path.clone()) {
                Some(path) => {
                    tracing::info!("Using saved model at {}", path.display());
                    run_predict(PersistedModelSource::new(path), &input)
                }
                None => run_predict(DatasetSource::new(config), &input),
            }
        }
    }
}

fn run_train(config: &AppConfig, output: Option<PathBuf>) -> Result<()> {
    let outcome = training::train_from_config(config).context("Training failed")?;

    println!("{}", outcome.evaluation.summary());
    println!("{}", outcome.model.coefficient_table());

    if let Some(path) = output.or_else(|| config.model.path.clone()) {
        let persisted = PersistedModel::new(outcome.model, Some(outcome.evaluation), &SystemClock);
        persisted
            .save(&path)
            .with_context(|| format!("Failed to save model to {}", path.display()))?;
        tracing::info!("Saved model to {}", path.display());
    }

    Ok(())
}

fn run_predict<S: ModelSource>(source: S, input: &PredictionInput) -> Result<()> {
    let cache = ModelCache::new(source);
    let prediction = cache.predict(input).context("Prediction failed")?;

    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}
