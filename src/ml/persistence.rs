//! Model persistence - save and load fitted models as JSON

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ForecastError;
use crate::traits::{Clock, ModelSource};

use super::model::FittedModel;
use super::training::Evaluation;

/// A fitted model with the metadata needed to serve it later
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedModel {
    /// Version for backward compatibility
    pub version: u32,
    /// When the model was trained
    pub created_at: DateTime<Utc>,
    pub model: FittedModel,
    /// Held-out evaluation from the training run, if one was recorded
    pub evaluation: Option<Evaluation>,
}

impl PersistedModel {
    /// Current version number
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(model: FittedModel, evaluation: Option<Evaluation>, clock: &dyn Clock) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            created_at: clock.now_utc(),
            model,
            evaluation,
        }
    }

    /// Save as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| PersistenceError::Io(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PersistenceError::Serialize(e.to_string()))?;

        fs::write(path, json).map_err(|e| PersistenceError::Io(e.to_string()))?;

        Ok(())
    }

    /// Load a saved model. The model's schema is checked while deserializing.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        if !path.exists() {
            return Err(PersistenceError::FileNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let json = fs::read_to_string(path).map_err(|e| PersistenceError::Io(e.to_string()))?;

        let persisted: Self = serde_json::from_str(&json)
            .map_err(|e| PersistenceError::Deserialize(e.to_string()))?;

        if persisted.version > Self::CURRENT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: persisted.version,
            });
        }

        Ok(persisted)
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Model v{}: {} columns, {}, created {}",
            self.version,
            self.model.feature_columns().len(),
            self.evaluation
                .map(|e| e.summary())
                .unwrap_or_else(|| "no evaluation".to_string()),
            self.created_at.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

/// Errors that can occur during model persistence
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("model file not found: {0}")]
    FileNotFound(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialize(String),
    #[error("deserialization error: {0}")]
    Deserialize(String),
    #[error("model version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Serves a previously saved model instead of training.
#[derive(Debug, Clone)]
pub struct PersistedModelSource {
    path: PathBuf,
}

impl PersistedModelSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModelSource for PersistedModelSource {
    fn build_model(&self) -> Result<FittedModel, ForecastError> {
        let persisted = PersistedModel::load(&self.path)?;
        tracing::info!("Loaded {}", persisted.summary());
        Ok(persisted.model)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;
    use crate::ml::{FeatureColumn, TargetStats};
    use crate::traits::MockClock;

    fn create_test_model() -> PersistedModel {
        let model = FittedModel::new(
            vec![12.0, 0.5, -1.5, 3.0],
            vec![
                FeatureColumn::Temperature,
                FeatureColumn::Precipitation,
                FeatureColumn::DayOfWeek(5),
            ],
            TargetStats {
                min: 0.0,
                max: 90.0,
                mean: 30.0,
                std: 12.0,
            },
        )
        .unwrap();
        let clock = MockClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap());

        PersistedModel::new(
            model,
            Some(Evaluation {
                train_rows: 80,
                test_rows: 20,
                rmse: 4.25,
                r_squared: 0.61,
            }),
            &clock,
        )
    }

    #[test]
    fn test_persisted_model_creation() {
        let persisted = create_test_model();

        assert_eq!(persisted.version, PersistedModel::CURRENT_VERSION);
        assert_eq!(
            persisted.created_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
        );
        assert_eq!(persisted.model.feature_columns().len(), 3);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");

        let persisted = create_test_model();
        persisted.save(&path).unwrap();

        let loaded = PersistedModel::load(&path).unwrap();

        assert_eq!(loaded.model, persisted.model);
        assert_eq!(loaded.evaluation, persisted.evaluation);
        assert_eq!(loaded.created_at, persisted.created_at);
    }

    #[test]
    fn test_columns_stored_by_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        create_test_model().save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(
            json["model"]["feature_columns"],
            serde_json::json!(["temperature", "precipitation", "dow_5"])
        );
    }

    #[test]
    fn test_load_nonexistent() {
        let path = Path::new("/nonexistent/path/model.json");
        let result = PersistedModel::load(path);

        assert!(matches!(result, Err(PersistenceError::FileNotFound(_))));
    }

    #[test]
    fn test_load_rejects_newer_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut persisted = create_test_model();
        persisted.version = PersistedModel::CURRENT_VERSION + 1;
        persisted.save(&path).unwrap();

        let result = PersistedModel::load(&path);

        assert!(matches!(result, Err(PersistenceError::VersionMismatch { .. })));
    }

    #[test]
    fn test_load_rejects_mismatched_coefficients() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        create_test_model().save(&path).unwrap();

        let mut json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        json["model"]["coefficients"] = serde_json::json!([1.0, 2.0]);
        fs::write(&path, json.to_string()).unwrap();

        let result = PersistedModel::load(&path);

        match result {
            Err(PersistenceError::Deserialize(msg)) => assert!(msg.contains("schema mismatch")),
            other => panic!("expected a schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_summary() {
        let summary = create_test_model().summary();

        assert!(summary.contains("3 columns"));
        assert!(summary.contains("rmse=4.250"));
        assert!(summary.contains("2024-03-01 09:30 UTC"));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dirs").join("model.json");

        let result = create_test_model().save(&path);

        assert!(result.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_persisted_source_serves_saved_model() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let persisted = create_test_model();
        persisted.save(&path).unwrap();

        let model = PersistedModelSource::new(&path).build_model().unwrap();

        assert_eq!(model, persisted.model);
    }

    #[test]
    fn test_persisted_source_missing_file() {
        let result = PersistedModelSource::new("/nonexistent/model.json").build_model();

        assert!(matches!(
            result,
            Err(ForecastError::Persistence(PersistenceError::FileNotFound(_)))
        ));
    }
}
