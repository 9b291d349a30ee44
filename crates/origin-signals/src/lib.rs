//! ORIGIN Signals - feature aggregation and model inference
//!
//! Two halves of the scoring stage: `FeatureService` aggregates per-upload
//! history from the database, `InferenceService` turns those features into
//! risk/assurance/anomaly/synthetic scores under pinned model versions.

pub mod features;
pub mod inference;

pub use features::FeatureService;
pub use inference::{InferenceService, ModelFile, ModelStatus};

use thiserror::Error;

use origin_db::DbError;

/// Signal computation errors
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Model load failed: {0}")]
    ModelLoad(String),
}

pub type Result<T> = std::result::Result<T, SignalError>;
