//! Training pipeline for the footfall model

use ndarray::{Array1, Array2, s};
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{AppConfig, TrainingConfig};
use crate::error::ForecastError;
use crate::loader::{self, TimeSeries};
use crate::traits::ModelSource;

use super::features::{FeatureBuilder, FeatureMatrix};
use super::model::{FittedModel, TargetStats, least_squares, with_intercept};

/// Held-out evaluation of a fitted model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub train_rows: usize,
    pub test_rows: usize,
    /// NaN when the held-out partition is empty
    #[serde(deserialize_with = "nan_from_null")]
    pub rmse: f64,
    /// NaN when the held-out target has zero variance
    #[serde(deserialize_with = "nan_from_null")]
    pub r_squared: f64,
}

// serde_json writes NaN as null.
fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl Evaluation {
    pub fn summary(&self) -> String {
        format!(
            "train_rows={}, test_rows={}, rmse={:.3}, r2={:.3}",
            self.train_rows, self.test_rows, self.rmse, self.r_squared
        )
    }
}

/// Result of a training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: FittedModel,
    pub evaluation: Evaluation,
}

/// Fits the model on the leading, chronologically ordered share of the rows.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Number of leading rows used for fitting (truncating).
    pub fn split_index(&self, n_rows: usize) -> usize {
        ((n_rows as f64 * self.config.train_fraction) as usize).min(n_rows)
    }

    /// Fit on the training partition and evaluate on the rest.
    ///
    /// Target statistics are taken over every row, not just the training
    /// partition. Rows are never shuffled.
    pub fn fit(&self, matrix: &FeatureMatrix) -> Result<TrainingOutcome, ForecastError> {
        let n_rows = matrix.n_rows();
        let split = self.split_index(n_rows);
        if split == 0 {
            return Err(ForecastError::InsufficientData {
                found: split,
                required: 1,
            });
        }

        let train_records = matrix.records.slice(s![..split, ..]).to_owned();
        let train_targets = matrix.targets.slice(s![..split]).to_owned();
        let test_records = matrix.records.slice(s![split.., ..]).to_owned();
        let test_targets = matrix.targets.slice(s![split..]).to_owned();

        let beta = least_squares(&with_intercept(&train_records), &train_targets)?;

        let model = FittedModel::new(
            beta.to_vec(),
            matrix.columns.clone(),
            TargetStats::from_targets(&matrix.targets),
        )?;

        let (rmse, r_squared) = evaluate(&model, &test_records, &test_targets)?;
        let evaluation = Evaluation {
            train_rows: split,
            test_rows: n_rows - split,
            rmse,
            r_squared,
        };

        tracing::info!("Trained footfall model: {}", evaluation.summary());
        tracing::debug!("{}", model.info());

        Ok(TrainingOutcome { model, evaluation })
    }
}

/// RMSE and R² of `model` against a held-out partition.
pub fn evaluate(
    model: &FittedModel,
    records: &Array2<f64>,
    targets: &Array1<f64>,
) -> Result<(f64, f64), ForecastError> {
    if targets.is_empty() {
        return Ok((f64::NAN, f64::NAN));
    }

    let predictions = model.predict_records(records)?;
    let n = targets.len() as f64;

    let ss_res: f64 = predictions
        .iter()
        .zip(targets.iter())
        .map(|(p, y)| (y - p).powi(2))
        .sum();
    let mean = targets.sum() / n;
    let ss_tot: f64 = targets.iter().map(|y| (y - mean).powi(2)).sum();

    let rmse = (ss_res / n).sqrt();
    let r_squared = if ss_tot == 0.0 {
        f64::NAN
    } else {
        1.0 - ss_res / ss_tot
    };

    Ok((rmse, r_squared))
}

/// Feature-build and fit already loaded series.
pub fn train_from_series(
    series: &TimeSeries,
    config: &TrainingConfig,
) -> Result<TrainingOutcome, ForecastError> {
    let matrix = FeatureBuilder::new(config.min_rows).build(series)?;
    Trainer::new(*config).fit(&matrix)
}

/// Load the configured datasets, then feature-build and fit.
pub fn train_from_config(config: &AppConfig) -> Result<TrainingOutcome, ForecastError> {
    let series = loader::load_sources(config)?;
    train_from_series(&series, &config.training)
}

/// Builds the model from the datasets named in the configuration.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    config: AppConfig,
}

impl DatasetSource {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

impl ModelSource for DatasetSource {
    fn build_model(&self) -> Result<FittedModel, ForecastError> {
        train_from_config(&self.config).map(|outcome| outcome.model)
    }
}
