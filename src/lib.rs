//! `dialog-inference` - Response prediction for neural dialog models.
//!
//! Given a trained forward dialog model, this crate builds a [`Predictor`]
//! for one of four prediction modes:
//!
//! - **beamsearch**: beam search over the forward model
//! - **beamsearch_reranking**: beam search, then MMI reranking
//! - **sampling**: temperature sampling from the forward model
//! - **sampling_reranking**: sampling, then MMI reranking
//!
//! Reranking modes score candidates with a reverse model as well. That model
//! is loaded lazily on first use and kept in a process-wide cache, so it is
//! loaded at most once no matter how many predictors are built.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dialog_inference::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DialogError> {
//!     let provider = DirectoryModelProvider::new("models");
//!     let model = provider.load_trained_model(ModelDirection::Forward)?;
//!
//!     let config = PredictionConfig::new()
//!         .with_temperature(0.7)
//!         .with_samples_num(10)
//!         .with_mmi_reverse_model_score_weight(0.5);
//!     let predictor = predictor_factory(model, "sampling_reranking", &config, &provider)?;
//!
//!     let context = DialogContext::single(vec![17, 42, 8]);
//!     let response = predictor.predict_response(&context).await?;
//!     println!("{:?} ({:.3})", response.tokens, response.score);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! mode + config
//!      │
//!      ▼
//! ┌────────────────────┐      ┌─────────────────────┐
//! │  PredictorFactory  │ ───▶ │  ReverseModelCache  │  (reranking modes only)
//! └─────────┬──────────┘      └─────────────────────┘
//!           │
//!           ▼
//! ┌────────────────────┐
//! │     Predictor      │
//! │  generator ──▶     │  beam search | sampling
//! │  reranker          │  identity    | MMI
//! └────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod factory;
pub mod generation;
pub mod model;
pub mod predictor;
pub mod reranker;
pub mod types;

pub use factory::{PredictorFactory, predictor_factory};
pub use predictor::Predictor;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::config::{
        BeamSearchParams, GeneratorKind, MmiParams, PredictionConfig, PredictionMode,
        SamplingParams,
    };
    pub use crate::error::{DialogError, ModelError, PredictionError, Result};
    pub use crate::factory::{PredictorFactory, predictor_factory};
    pub use crate::generation::{
        BeamSearchCandidatesGenerator, CandidatesGenerator, SamplingCandidatesGenerator,
    };
    pub use crate::model::{
        BigramDialogModel, DialogModel, DirectoryModelProvider, MockModelProvider, ModelDirection,
        ReverseModelCache, TrainedModelProvider,
    };
    pub use crate::predictor::Predictor;
    pub use crate::reranker::{CandidatesReranker, IdentityReranker, MmiReranker, RerankerKind};
    pub use crate::types::{Candidate, DialogContext, SpecialTokens, TokenId};
}
