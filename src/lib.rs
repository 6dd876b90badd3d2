//! Footfall Forecast Library
//!
//! Reconciles hourly foot-traffic counts with weather observations, fits an
//! ordinary-least-squares model of hourly in-count and scores future hours
//! as a bounded likelihood.

pub mod cache;
pub mod config;
pub mod error;
pub mod loader;
pub mod ml;
pub mod traits;

// Re-export commonly used types
pub use cache::ModelCache;
pub use config::AppConfig;
pub use error::ForecastError;
pub use loader::{RawFootfallRecord, RawWeatherRecord, TimeSeries};
pub use ml::{
    DatasetSource, Evaluation, FeatureBuilder, FeatureColumn, FittedModel, PersistedModel,
    PersistedModelSource, Prediction, PredictionInput, Trainer, TrainingOutcome,
};
pub use traits::{Clock, CountingSource, MockClock, ModelSource, SystemClock};
