//! Beam search candidate generation.

use std::sync::Arc;

use async_trait::async_trait;

use super::CandidatesGenerator;
use super::penalty::penalize_repetitions;
use crate::config::{BeamSearchParams, GeneratorKind};
use crate::error::ModelError;
use crate::model::DialogModel;
use crate::types::{Candidate, DialogContext, TokenId, sort_by_score_desc};

/// Generates the `beam_size` most likely responses with beam search.
///
/// A hypothesis is finished when its best continuation is the end-of-sequence
/// token, or when it reaches `max_response_length` tokens. Scores are sums of
/// repetition-penalized log-probabilities.
pub struct BeamSearchCandidatesGenerator {
    model: Arc<dyn DialogModel>,
    params: BeamSearchParams,
}

impl BeamSearchCandidatesGenerator {
    /// Create a new beam search generator.
    #[must_use]
    pub fn new(model: Arc<dyn DialogModel>, params: BeamSearchParams) -> Self {
        Self { model, params }
    }

    /// Generation parameters.
    #[must_use]
    pub fn params(&self) -> &BeamSearchParams {
        &self.params
    }

    /// Expand one hypothesis with its `beam_size` best finite continuations.
    async fn expand(
        &self,
        context: &DialogContext,
        hypothesis: &Candidate,
    ) -> Result<Vec<Expansion>, ModelError> {
        let special = self.model.special_tokens();
        let mut log_probs = self
            .model
            .next_token_log_probs(context, &hypothesis.tokens)
            .await?;
        penalize_repetitions(
            &mut log_probs,
            &hypothesis.tokens,
            self.params.repetition_penalization_coefficient,
            &special,
        );

        let expansions = top_k(&log_probs, self.params.beam_size)
            .into_iter()
            .map(|(token, log_prob)| {
                let score = hypothesis.score + log_prob;
                if token == special.eos {
                    Expansion {
                        candidate: Candidate::new(hypothesis.tokens.clone(), score),
                        finished: true,
                    }
                } else {
                    let mut tokens = hypothesis.tokens.clone();
                    tokens.push(token);
                    Expansion {
                        candidate: Candidate::new(tokens, score),
                        finished: false,
                    }
                }
            })
            .collect();

        Ok(expansions)
    }
}

impl std::fmt::Debug for BeamSearchCandidatesGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeamSearchCandidatesGenerator")
            .field("model", &self.model.name())
            .field("params", &self.params)
            .finish()
    }
}

struct Expansion {
    candidate: Candidate,
    finished: bool,
}

/// The `k` highest finite log-probabilities, best first, ties by token id.
fn top_k(log_probs: &[f32], k: usize) -> Vec<(TokenId, f32)> {
    let mut indexed: Vec<(TokenId, f32)> = log_probs
        .iter()
        .enumerate()
        .filter(|(_, log_prob)| log_prob.is_finite())
        .filter_map(|(index, &log_prob)| TokenId::try_from(index).ok().map(|t| (t, log_prob)))
        .collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k);
    indexed
}

#[async_trait]
impl CandidatesGenerator for BeamSearchCandidatesGenerator {
    async fn generate_candidates(
        &self,
        context: &DialogContext,
    ) -> Result<Vec<Candidate>, ModelError> {
        let beam_size = self.params.beam_size;
        let mut live = vec![Candidate::new(Vec::new(), 0.0)];
        let mut finished: Vec<Candidate> = Vec::with_capacity(beam_size);

        for _ in 0..self.params.max_response_length {
            let mut expansions = Vec::with_capacity(live.len() * beam_size);
            for hypothesis in &live {
                expansions.extend(self.expand(context, hypothesis).await?);
            }
            expansions.sort_by(|a, b| {
                b.candidate
                    .score
                    .partial_cmp(&a.candidate.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            expansions.truncate(beam_size);

            live.clear();
            for expansion in expansions {
                if expansion.finished {
                    finished.push(expansion.candidate);
                } else {
                    live.push(expansion.candidate);
                }
            }

            if finished.len() >= beam_size || live.is_empty() {
                break;
            }
        }

        // Hypotheses cut at the length limit count as finished.
        finished.append(&mut live);
        sort_by_score_desc(&mut finished);
        finished.truncate(beam_size);

        tracing::debug!(
            model = self.model.name(),
            beam_size,
            candidates = finished.len(),
            "Beam search finished"
        );
        Ok(finished)
    }

    fn kind(&self) -> GeneratorKind {
        GeneratorKind::BeamSearch
    }
}
