//! Lazily built, process-lifetime model cache.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::error::ForecastError;
use crate::ml::{FittedModel, Prediction, PredictionInput};
use crate::traits::ModelSource;

/// Holds zero or one [`FittedModel`].
///
/// The first caller builds the model under `build_lock`; concurrent first
/// callers wait on the lock and then reuse that result. Once set, reads go
/// through the `OnceLock` without locking. A failed build leaves the cache
/// empty so a later call can try again.
pub struct ModelCache<S> {
    source: S,
    model: OnceLock<Arc<FittedModel>>,
    build_lock: Mutex<()>,
}

impl<S: ModelSource> ModelCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            model: OnceLock::new(),
            build_lock: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The cached model, if one has been built.
    pub fn get(&self) -> Option<Arc<FittedModel>> {
        self.model.get().cloned()
    }

    /// Return the cached model, building it first if needed.
    pub fn ensure_model_ready(&self) -> Result<Arc<FittedModel>, ForecastError> {
        if let Some(model) = self.model.get() {
            return Ok(Arc::clone(model));
        }

        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(model) = self.model.get() {
            tracing::debug!("Reusing model built by a concurrent caller");
            return Ok(Arc::clone(model));
        }

        tracing::info!("Building footfall model");
        let model = Arc::new(self.source.build_model()?);
        tracing::info!("Model ready: {}", model.info());

        Ok(Arc::clone(self.model.get_or_init(|| model)))
    }

    /// Score one request against the cached model.
    pub fn predict(&self, input: &PredictionInput) -> Result<Prediction, ForecastError> {
        self.ensure_model_ready()?.predict(input)
    }
}
