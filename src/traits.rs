//! Seams for time and model construction.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic testing
//! - `ModelSource`: Abstracting where the cached model comes from

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};

use crate::error::ForecastError;
use crate::ml::FittedModel;

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing, fixed at one instant.
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    utc_time: DateTime<Utc>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self { utc_time: time }
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.utc_time
    }
}

// ==================== ModelSource Trait ====================

/// Produces a fitted model on demand.
///
/// The model cache calls this at most once per successful build.
pub trait ModelSource: Send + Sync {
    fn build_model(&self) -> Result<FittedModel, ForecastError>;
}

impl<F> ModelSource for F
where
    F: Fn() -> Result<FittedModel, ForecastError> + Send + Sync,
{
    fn build_model(&self) -> Result<FittedModel, ForecastError> {
        self()
    }
}

/// Wraps a source and counts how many builds it has run.
#[derive(Debug, Clone)]
pub struct CountingSource<S> {
    inner: S,
    builds: Arc<AtomicUsize>,
}

impl<S> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            builds: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of builds started so far.
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl<S: ModelSource> ModelSource for CountingSource<S> {
    fn build_model(&self) -> Result<FittedModel, ForecastError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.inner.build_model()
    }
}
