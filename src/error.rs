//! Error taxonomy for the forecasting pipeline.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::ml::persistence::PersistenceError;

/// Errors raised while loading data, training, or scoring.
///
/// Every training-phase error aborts model construction; there is no
/// partially built model.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A source file or directory is missing, unreadable, or lacks a
    /// required column.
    #[error("data source error ({}): {reason}", path.display())]
    DataSource { path: PathBuf, reason: String },

    /// The weather series holds more than one row for an hour.
    #[error("weather data holds more than one row for {timestamp}")]
    DataIntegrity { timestamp: NaiveDateTime },

    /// Too few complete hourly rows survived filtering.
    #[error("insufficient data for training: {found} valid rows, need at least {required}")]
    InsufficientData { found: usize, required: usize },

    /// A model's coefficients do not line up with its feature columns.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The least-squares solve failed.
    #[error("least-squares solve failed: {0}")]
    Solver(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ForecastError {
    pub(crate) fn data_source(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ForecastError::DataSource {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
