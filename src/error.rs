//! Error taxonomy for the scoring pipeline.
//!
//! `ArtifactError` covers the offline fit stage and startup artifact
//! loading; any occurrence at service start is fatal. `PipelineError`
//! covers per-request failures that are surfaced to the caller as a
//! failed-request response without affecting other in-flight requests.

use thiserror::Error;

/// Startup and offline-stage failures (missing or corrupt artifacts).
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid artifact: {0}")]
    Invalid(String),
}

/// Per-request failures.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Request named a model outside the registry. Client error.
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// Assembled feature vector does not match the active model's schema.
    #[error("feature schema mismatch at column {position}: expected '{expected}', found '{found}'")]
    SchemaMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    /// Transform invoked on an empty encoder state. Programming defect.
    #[error("risk encoder state is unfit; transform requires a fitted state")]
    EncoderPrecondition,

    /// Model invocation or output extraction failed.
    #[error("scoring failed for model '{model}': {detail}")]
    Scoring { model: String, detail: String },
}

impl PipelineError {
    /// Stable machine-readable label used in failed-request responses.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnknownModel(_) => "unknown_model",
            PipelineError::SchemaMismatch { .. } => "schema_mismatch",
            PipelineError::EncoderPrecondition => "encoder_precondition",
            PipelineError::Scoring { .. } => "scoring",
        }
    }
}
