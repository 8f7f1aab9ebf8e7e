//! Temperature sampling candidate generation.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rand::SeedableRng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;

use super::CandidatesGenerator;
use super::penalty::{apply_temperature, penalize_repetitions};
use crate::config::{GeneratorKind, SamplingParams};
use crate::error::ModelError;
use crate::model::DialogModel;
use crate::types::{Candidate, DialogContext, TokenId};

/// Draws `samples_num` independent responses from the model.
///
/// Each step penalizes repetitions, applies the temperature and draws the
/// next token. A candidate's score is the sum of the penalized log-probabilities
/// before tempering, so scores stay comparable across temperatures.
pub struct SamplingCandidatesGenerator {
    model: Arc<dyn DialogModel>,
    params: SamplingParams,
    rng: Mutex<StdRng>,
}

impl SamplingCandidatesGenerator {
    /// Create a new sampling generator, seeded from `params.seed` when present.
    #[must_use]
    pub fn new(model: Arc<dyn DialogModel>, params: SamplingParams) -> Self {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            model,
            params,
            rng: Mutex::new(rng),
        }
    }

    /// Generation parameters.
    #[must_use]
    pub fn params(&self) -> &SamplingParams {
        &self.params
    }

    async fn sample_one(&self, context: &DialogContext) -> Result<Candidate, ModelError> {
        let special = self.model.special_tokens();
        let mut tokens = Vec::new();
        let mut score = 0.0;

        for _ in 0..self.params.max_response_length {
            let mut log_probs = self.model.next_token_log_probs(context, &tokens).await?;
            penalize_repetitions(
                &mut log_probs,
                &tokens,
                self.params.repetition_penalization_coefficient,
                &special,
            );

            let token = self.draw(&log_probs)?;
            score += log_probs[token as usize];
            if token == special.eos {
                break;
            }
            tokens.push(token);
        }

        Ok(Candidate::new(tokens, score))
    }

    fn draw(&self, log_probs: &[f32]) -> Result<TokenId, ModelError> {
        let mut tempered = log_probs.to_vec();
        apply_temperature(&mut tempered, self.params.temperature);
        let weights: Vec<f32> = tempered.iter().map(|log_prob| log_prob.exp()).collect();
        let distribution = WeightedIndex::new(&weights)
            .map_err(|e| ModelError::Inference(format!("cannot sample next token: {e}")))?;

        let index = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            distribution.sample(&mut *rng)
        };
        TokenId::try_from(index)
            .map_err(|_| ModelError::Inference(format!("sampled index {index} overflows a token id")))
    }
}

impl std::fmt::Debug for SamplingCandidatesGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingCandidatesGenerator")
            .field("model", &self.model.name())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CandidatesGenerator for SamplingCandidatesGenerator {
    async fn generate_candidates(
        &self,
        context: &DialogContext,
    ) -> Result<Vec<Candidate>, ModelError> {
        let mut candidates = Vec::with_capacity(self.params.samples_num);
        for _ in 0..self.params.samples_num {
            candidates.push(self.sample_one(context).await?);
        }

        tracing::debug!(
            model = self.model.name(),
            temperature = self.params.temperature,
            candidates = candidates.len(),
            "Sampling finished"
        );
        Ok(candidates)
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Sampling
    }
}
