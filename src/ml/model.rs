//! Fitted linear model and its least-squares solver

use linfa_linalg::svd::SVD;
use ndarray::{Array1, Array2, s};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

use super::features::{FeatureColumn, PredictionInput};
use super::likelihood::{self, ModelInfo, Prediction};

/// Summary statistics of the full training target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation, replaced by 1.0 when exactly zero.
    pub std: f64,
}

impl TargetStats {
    pub fn from_targets(targets: &Array1<f64>) -> Self {
        if targets.is_empty() {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                std: 1.0,
            };
        }

        let min = targets.iter().copied().fold(f64::INFINITY, f64::min);
        let max = targets.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = targets.sum() / targets.len() as f64;
        let variance = targets.iter().map(|y| (y - mean).powi(2)).sum::<f64>() / targets.len() as f64;
        let std = variance.sqrt();

        Self {
            min,
            max,
            mean,
            std: if std == 0.0 { 1.0 } else { std },
        }
    }
}

/// A trained footfall model. Immutable once built.
///
/// `coefficients[0]` is the intercept; `coefficients[i + 1]` belongs to
/// `feature_columns[i]`. The column list is the authoritative schema for
/// scoring. Deserializing runs the same schema check as [`FittedModel::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredModel")]
pub struct FittedModel {
    coefficients: Vec<f64>,
    feature_columns: Vec<FeatureColumn>,
    y_min: f64,
    y_max: f64,
    y_mean: f64,
    y_std: f64,
}

/// Unchecked on-disk shape of [`FittedModel`].
#[derive(Deserialize)]
struct StoredModel {
    coefficients: Vec<f64>,
    feature_columns: Vec<FeatureColumn>,
    y_min: f64,
    y_max: f64,
    y_mean: f64,
    y_std: f64,
}

impl TryFrom<StoredModel> for FittedModel {
    type Error = ForecastError;

    fn try_from(stored: StoredModel) -> Result<Self, Self::Error> {
        FittedModel::new(
            stored.coefficients,
            stored.feature_columns,
            TargetStats {
                min: stored.y_min,
                max: stored.y_max,
                mean: stored.y_mean,
                std: stored.y_std,
            },
        )
    }
}

impl FittedModel {
    pub fn new(
        coefficients: Vec<f64>,
        feature_columns: Vec<FeatureColumn>,
        stats: TargetStats,
    ) -> Result<Self, ForecastError> {
        let model = Self {
            coefficients,
            feature_columns,
            y_min: stats.min,
            y_max: stats.max,
            y_mean: stats.mean,
            y_std: stats.std,
        };
        model.validate()?;
        Ok(model)
    }

    /// Check that there is exactly one coefficient per column plus the intercept.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.coefficients.len() != self.feature_columns.len() + 1 {
            return Err(ForecastError::SchemaMismatch(format!(
                "{} coefficients for {} feature columns (expected {})",
                self.coefficients.len(),
                self.feature_columns.len(),
                self.feature_columns.len() + 1
            )));
        }
        Ok(())
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.coefficients.first().copied().unwrap_or(0.0)
    }

    pub fn feature_columns(&self) -> &[FeatureColumn] {
        &self.feature_columns
    }

    pub fn target_stats(&self) -> TargetStats {
        TargetStats {
            min: self.y_min,
            max: self.y_max,
            mean: self.y_mean,
            std: self.y_std,
        }
    }

    /// Rebuild a feature row for `input` in this model's column order.
    pub fn feature_row(&self, input: &PredictionInput) -> Vec<f64> {
        self.feature_columns
            .iter()
            .map(|column| column.input_value(input))
            .collect()
    }

    /// Raw linear prediction of the in-count. Not clamped.
    pub fn predict_incount(&self, input: &PredictionInput) -> Result<f64, ForecastError> {
        self.validate()?;
        let row = self.feature_row(input);

        Ok(self.intercept()
            + self
                .coefficients
                .iter()
                .skip(1)
                .zip(row.iter())
                .map(|(beta, x)| beta * x)
                .sum::<f64>())
    }

    /// Score a request: raw in-count plus its likelihood in [0, 1].
    pub fn predict(&self, input: &PredictionInput) -> Result<Prediction, ForecastError> {
        let predicted_incount = self.predict_incount(input)?;
        let stats = self.target_stats();
        let (likelihood, scale) = likelihood::likelihood(predicted_incount, &stats);

        Ok(Prediction {
            predicted_incount,
            likelihood,
            model_info: ModelInfo {
                y_min: self.y_min,
                y_max: self.y_max,
            },
            scale,
        })
    }

    /// Predict every row of a design matrix without the intercept column.
    pub fn predict_records(&self, records: &Array2<f64>) -> Result<Array1<f64>, ForecastError> {
        self.validate()?;
        if records.ncols() != self.feature_columns.len() {
            return Err(ForecastError::SchemaMismatch(format!(
                "{} record columns for {} feature columns",
                records.ncols(),
                self.feature_columns.len()
            )));
        }

        let betas: Array1<f64> = self.coefficients.iter().skip(1).copied().collect();
        Ok(records.dot(&betas) + self.intercept())
    }

    /// Plain-text table of coefficient names and values.
    pub fn coefficient_table(&self) -> String {
        let mut out = format!("{:<16}{:>14}\n", "feature", "coefficient");
        out.push_str(&format!("{:<16}{:>14.4}\n", "intercept", self.intercept()));
        for (column, beta) in self.feature_columns.iter().zip(self.coefficients.iter().skip(1)) {
            out.push_str(&format!("{:<16}{:>14.4}\n", column.to_string(), beta));
        }
        out
    }

    /// One-line description for logs.
    pub fn info(&self) -> String {
        format!(
            "FittedModel(columns={}, intercept={:.3}, y_range=[{:.1}, {:.1}], y_mean={:.2})",
            self.feature_columns.len(),
            self.intercept(),
            self.y_min,
            self.y_max,
            self.y_mean
        )
    }
}

/// Prepend a column of ones.
pub fn with_intercept(records: &Array2<f64>) -> Array2<f64> {
    let mut design = Array2::ones((records.nrows(), records.ncols() + 1));
    design.slice_mut(s![.., 1..]).assign(records);
    design
}

/// Minimum-norm least-squares solution of `design · β ≈ targets`.
///
/// Solved through a thin SVD; singular values below
/// `eps · max(rows, cols) · σ_max` are treated as zero, so columns that are
/// constant zero in the training partition get a zero coefficient.
pub fn least_squares(design: &Array2<f64>, targets: &Array1<f64>) -> Result<Array1<f64>, ForecastError> {
    if design.nrows() != targets.len() {
        return Err(ForecastError::Solver(format!(
            "{} design rows for {} targets",
            design.nrows(),
            targets.len()
        )));
    }
    if design.nrows() == 0 {
        return Err(ForecastError::Solver("empty design matrix".to_string()));
    }

    let (u, sigma, vt) = design
        .svd(true, true)
        .map_err(|e| ForecastError::Solver(e.to_string()))?;
    let (Some(u), Some(vt)) = (u, vt) else {
        return Err(ForecastError::Solver("SVD returned no singular vectors".to_string()));
    };

    let sigma_max = sigma.iter().copied().fold(0.0, f64::max);
    let cutoff = f64::EPSILON * design.nrows().max(design.ncols()) as f64 * sigma_max;

    let mut beta = Array1::<f64>::zeros(design.ncols());
    for (i, &singular) in sigma.iter().enumerate() {
        if singular > cutoff {
            let weight = u.column(i).dot(targets) / singular;
            beta.scaled_add(weight, &vt.row(i));
        }
    }

    Ok(beta)
}
