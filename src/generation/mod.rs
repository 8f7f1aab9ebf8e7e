//! Candidate response generation.
//!
//! Two strategies are provided:
//! - `BeamSearchCandidatesGenerator` keeps the best partial responses at every step
//! - `SamplingCandidatesGenerator` draws independent responses with a temperature

pub mod beam_search;
pub mod penalty;
pub mod sampling;

use async_trait::async_trait;

use crate::config::GeneratorKind;
use crate::error::ModelError;
use crate::types::{Candidate, DialogContext};

pub use beam_search::BeamSearchCandidatesGenerator;
pub use penalty::{apply_temperature, normalize_log_probs, penalize_repetitions};
pub use sampling::SamplingCandidatesGenerator;

/// Trait for producing candidate responses to a dialog context.
#[async_trait]
pub trait CandidatesGenerator: Send + Sync {
    /// Generate candidate responses for `context`.
    ///
    /// # Arguments
    /// * `context` - The dialog history to respond to
    ///
    /// # Returns
    /// Candidates with their generation scores.
    async fn generate_candidates(
        &self,
        context: &DialogContext,
    ) -> Result<Vec<Candidate>, ModelError>;

    /// The generator family.
    fn kind(&self) -> GeneratorKind;
}
