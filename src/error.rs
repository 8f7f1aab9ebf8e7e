//! Unified error types for `dialog-inference`.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::PredictionMode;

/// The main error type for `dialog-inference` operations.
#[derive(Debug, Error)]
pub enum DialogError {
    /// Prediction errors
    #[error("Prediction error: {0}")]
    Prediction(#[from] PredictionError),

    /// Model errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while assembling or running a predictor.
#[derive(Debug, Error)]
pub enum PredictionError {
    /// The requested prediction mode is not one of the supported modes.
    #[error("Unknown prediction mode {mode}. Use one of the following: {}", legal_modes())]
    InvalidMode {
        /// The rejected mode string.
        mode: String,
    },

    /// A reranking mode was requested with a non-positive reverse model weight.
    #[error("mmi_reverse_model_score_weight should be > 0 for reranking mode, got {0}")]
    InvalidWeight(f32),

    /// A parameter used by the selected mode is out of range.
    #[error("Invalid prediction config: {0}")]
    InvalidConfig(String),

    /// The reverse model needed for reranking could not be loaded.
    #[error(
        "Can't get reverse dialog model for prediction. Train a reverse model with \
         `train --reverse` or switch prediction mode to beamsearch or sampling."
    )]
    ReverseModelUnavailable {
        /// The underlying loading failure.
        #[source]
        source: ModelError,
    },

    /// Generation produced no candidate for a context.
    #[error("No candidates were generated for the given context")]
    NoCandidates,

    /// Model failure during generation or reranking.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors related to dialog models.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No trained model artifact exists at the expected location.
    #[error("Trained model not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The artifact exists but could not be loaded.
    #[error("Failed to load dialog model: {0}")]
    Load(String),

    /// The model weights are malformed.
    #[error("Invalid model weights: {0}")]
    InvalidWeights(String),

    /// A token id outside of the vocabulary was used.
    #[error("Token {token} is out of vocabulary (size {vocab_size})")]
    UnknownToken {
        /// The offending token id.
        token: u32,
        /// Vocabulary size of the model.
        vocab_size: usize,
    },

    /// Inference failed.
    #[error("Inference failed: {0}")]
    Inference(String),
}

fn legal_modes() -> String {
    PredictionMode::ALL
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A type alias for Results with [`DialogError`].
pub type Result<T> = std::result::Result<T, DialogError>;
