//! Footfall regression model
//!
//! Feature building, the least-squares fit, held-out evaluation, likelihood
//! scoring and persistence of the fitted model.

pub mod features;
pub mod likelihood;
pub mod model;
pub mod persistence;
pub mod training;

pub use features::{FeatureBuilder, FeatureColumn, FeatureMatrix, HourlyObservation, PredictionInput};
pub use likelihood::{LikelihoodScale, ModelInfo, Prediction};
pub use model::{FittedModel, TargetStats};
pub use persistence::{PersistedModel, PersistedModelSource, PersistenceError};
pub use training::{DatasetSource, Evaluation, Trainer, TrainingOutcome};
