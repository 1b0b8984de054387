use std::fmt;

use thiserror::Error;

/// Which enumerated option a caller got wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    Sentiment,
    Length,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKind::Sentiment => f.write_str("sentiment"),
            OptionKind::Length => f.write_str("length"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StudioError {
    /// Empty or whitespace-only text.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A sentiment or length value outside the fixed sets.
    #[error("Unsupported {kind} option: {value}")]
    UnsupportedOption { kind: OptionKind, value: String },

    /// The wrapped model failed to run.
    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    // Download, config or tokenizer problems while building a model
    #[error("Model loading failed: {0}")]
    ModelLoad(String),
}

pub type Result<T> = std::result::Result<T, StudioError>;

impl StudioError {
    pub fn unsupported(kind: OptionKind, value: &str) -> Self {
        StudioError::UnsupportedOption {
            kind,
            value: value.to_string(),
        }
    }

    pub(crate) fn model_load(err: impl fmt::Display) -> Self {
        StudioError::ModelLoad(err.to_string())
    }

    pub(crate) fn inference(err: impl fmt::Display) -> Self {
        StudioError::InferenceFailure(err.to_string())
    }

    /// Short machine-readable tag, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            StudioError::InvalidInput(_) => "invalid_input",
            StudioError::UnsupportedOption { .. } => "unsupported_option",
            StudioError::InferenceFailure(_) => "inference_failure",
            StudioError::ModelLoad(_) => "model_load",
        }
    }
}

impl From<candle_core::Error> for StudioError {
    fn from(value: candle_core::Error) -> Self {
        StudioError::InferenceFailure(value.to_string())
    }
}

impl From<hf_hub::api::sync::ApiError> for StudioError {
    fn from(value: hf_hub::api::sync::ApiError) -> Self {
        StudioError::ModelLoad(value.to_string())
    }
}

impl From<std::io::Error> for StudioError {
    fn from(value: std::io::Error) -> Self {
        StudioError::ModelLoad(value.to_string())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(value: serde_json::Error) -> Self {
        StudioError::ModelLoad(value.to_string())
    }
}
