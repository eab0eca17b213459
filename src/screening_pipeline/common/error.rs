use std::fmt;

use thiserror::Error;

/// Why the inference boundary refused a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotReadyReason {
    /// The classifier has not signalled readiness yet.
    StillLoading,
    /// The classifier reported a load failure; it will never become ready.
    LoadFailed(String),
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReadyReason::StillLoading => write!(f, "classifier is still loading"),
            NotReadyReason::LoadFailed(msg) => write!(f, "classifier failed to load: {}", msg),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("Shape mismatch: {0}")]
    ShapeError(String),

    #[error("Normalization profile not configured: {0}")]
    NormalizationConfigError(String),

    #[error("Inference not ready: {0}")]
    InferenceNotReady(NotReadyReason),

    #[error("Inference failed: {0}")]
    InferenceError(String),

    #[error("Unexpected classifier output length: expected {expected}, got {actual}")]
    UnexpectedOutputShape { expected: usize, actual: usize },

    #[error("Invalid classifier configuration: {0}")]
    ConfigError(String),
}

/// Tag of a [`PipelineError`], small enough to live inside a request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputRead,
    Decode,
    UnsupportedFormat,
    InvalidDimensions,
    Shape,
    NormalizationConfig,
    InferenceNotReady,
    Inference,
    UnexpectedOutputShape,
    Config,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InputReadError(_) => ErrorKind::InputRead,
            PipelineError::DecodeError(_) => ErrorKind::Decode,
            PipelineError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            PipelineError::InvalidDimensions(_, _) => ErrorKind::InvalidDimensions,
            PipelineError::ShapeError(_) => ErrorKind::Shape,
            PipelineError::NormalizationConfigError(_) => ErrorKind::NormalizationConfig,
            PipelineError::InferenceNotReady(_) => ErrorKind::InferenceNotReady,
            PipelineError::InferenceError(_) => ErrorKind::Inference,
            PipelineError::UnexpectedOutputShape { .. } => ErrorKind::UnexpectedOutputShape,
            PipelineError::ConfigError(_) => ErrorKind::Config,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
