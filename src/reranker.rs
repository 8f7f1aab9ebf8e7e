//! Reranking of generated candidate responses.
//!
//! Provides two strategies:
//! - `IdentityReranker` - Keeps the generator's order and scores
//! - `MmiReranker` - Maximum Mutual Information reranking with a reverse model
//!
//! # Example
//!
//! ```rust,ignore
//! use dialog_inference::reranker::{CandidatesReranker, MmiReranker};
//!
//! let reranker = MmiReranker::new(forward, reverse, config.mmi_params()?);
//! let reranked = reranker.rerank_candidates(&context, candidates).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::config::MmiParams;
use crate::error::ModelError;
use crate::model::DialogModel;
use crate::types::{Candidate, DialogContext, sort_by_score_desc};

/// Reranking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankerKind {
    /// Candidates pass through unchanged.
    Identity,
    /// Maximum Mutual Information reranking.
    Mmi,
}

/// Trait for reordering candidate responses.
#[async_trait]
pub trait CandidatesReranker: Send + Sync {
    /// Rerank the candidates generated for `context`.
    ///
    /// # Arguments
    ///
    /// * `context` - The dialog history the candidates respond to.
    /// * `candidates` - The generated candidates.
    ///
    /// # Returns
    ///
    /// The candidates, best first, with updated scores.
    async fn rerank_candidates(
        &self,
        context: &DialogContext,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, ModelError>;

    /// The reranking strategy.
    fn kind(&self) -> RerankerKind;
}

/// A reranker that returns candidates unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityReranker;

impl IdentityReranker {
    /// Create a new identity reranker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CandidatesReranker for IdentityReranker {
    async fn rerank_candidates(
        &self,
        _context: &DialogContext,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, ModelError> {
        Ok(candidates)
    }

    fn kind(&self) -> RerankerKind {
        RerankerKind::Identity
    }
}

/// Maximum Mutual Information reranker.
///
/// Scores each candidate `r` for context `c` as
/// `(1 - w) * log P(r | c) + w * log P(last utterance of c | r)`, minus
/// `ln(coefficient)` for every repeated token of `r`. Generic responses that
/// say little about the context get a low reverse score and sink. Responses
/// the forward model rates impossible score negative infinity for any weight.
pub struct MmiReranker {
    model: Arc<dyn DialogModel>,
    reverse_model: Arc<dyn DialogModel>,
    params: MmiParams,
}

impl MmiReranker {
    /// Create a new MMI reranker.
    #[must_use]
    pub fn new(
        model: Arc<dyn DialogModel>,
        reverse_model: Arc<dyn DialogModel>,
        params: MmiParams,
    ) -> Self {
        Self {
            model,
            reverse_model,
            params,
        }
    }

    /// The reverse model used for scoring.
    #[must_use]
    pub fn reverse_model(&self) -> &Arc<dyn DialogModel> {
        &self.reverse_model
    }

    /// Reranking parameters.
    #[must_use]
    pub fn params(&self) -> &MmiParams {
        &self.params
    }

    /// MMI score of a single candidate.
    ///
    /// # Errors
    ///
    /// Returns an error if either model fails to score the candidate.
    pub async fn score_candidate(
        &self,
        context: &DialogContext,
        candidate: &Candidate,
    ) -> Result<f32, ModelError> {
        let weight = self.params.reverse_model_score_weight;

        let forward_weight = 1.0 - weight;
        let forward_term = if forward_weight.abs() <= f32::EPSILON {
            0.0
        } else {
            let log_likelihood = self
                .model
                .sequence_log_likelihood(context, &candidate.tokens)
                .await?;
            // A response the forward model cannot produce stays last, even
            // when a weight above 1 flips the sign of the forward term.
            if log_likelihood.is_infinite() && log_likelihood.is_sign_negative() {
                return Ok(f32::NEG_INFINITY);
            }
            forward_weight * log_likelihood
        };

        let reverse_term = match context.last_utterance() {
            Some(utterance) => {
                let reverse_context = DialogContext::single(candidate.tokens.clone());
                weight
                    * self
                        .reverse_model
                        .sequence_log_likelihood(&reverse_context, utterance)
                        .await?
            }
            None => 0.0,
        };

        #[allow(clippy::cast_precision_loss)]
        let repetitions = candidate.num_repetitions(&self.model.special_tokens()) as f32;
        let repetition_penalty =
            self.params.repetition_penalization_coefficient.ln() * repetitions;

        Ok(forward_term + reverse_term - repetition_penalty)
    }
}

impl std::fmt::Debug for MmiReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmiReranker")
            .field("model", &self.model.name())
            .field("reverse_model", &self.reverse_model.name())
            .field("params", &self.params)
            .finish()
    }
}

#[async_trait]
impl CandidatesReranker for MmiReranker {
    async fn rerank_candidates(
        &self,
        context: &DialogContext,
        candidates: Vec<Candidate>,
    ) -> Result<Vec<Candidate>, ModelError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let scores = try_join_all(
            candidates
                .iter()
                .map(|candidate| self.score_candidate(context, candidate)),
        )
        .await?;

        let mut reranked: Vec<Candidate> = candidates
            .into_iter()
            .zip(scores)
            .map(|(candidate, score)| Candidate::new(candidate.tokens, score))
            .collect();
        sort_by_score_desc(&mut reranked);

        tracing::debug!(
            candidates = reranked.len(),
            best_score = reranked[0].score,
            "MMI reranking finished"
        );
        Ok(reranked)
    }

    fn kind(&self) -> RerankerKind {
        RerankerKind::Mmi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BigramDialogModel;
    use crate::types::SpecialTokens;

    // Vocabulary: 0 pad, 1 start, 2 eos, 3 "how", 4 "fine", 5 "ok".
    fn forward_model() -> Arc<dyn DialogModel> {
        let mut weights = vec![vec![1.0; 6]; 6];
        // After "how": the generic "ok" is the forward favourite.
        weights[3] = vec![0.0, 0.0, 0.0, 0.0, 0.3, 0.7];
        weights[4] = vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        weights[5] = vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        Arc::new(
            BigramDialogModel::from_weights("forward", weights, SpecialTokens::default())
                .unwrap(),
        )
    }

    fn reverse_model() -> Arc<dyn DialogModel> {
        let mut weights = vec![vec![1.0; 6]; 6];
        // "fine" explains "how" much better than "ok" does.
        weights[4] = vec![0.0, 0.0, 0.0, 0.9, 0.05, 0.05];
        weights[5] = vec![0.0, 0.0, 0.0, 0.1, 0.45, 0.45];
        weights[3] = vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        Arc::new(
            BigramDialogModel::from_weights("reverse", weights, SpecialTokens::default())
                .unwrap(),
        )
    }

    fn candidates() -> Vec<Candidate> {
        vec![Candidate::new(vec![5], -0.36), Candidate::new(vec![4], -1.2)]
    }

    fn mmi(weight: f32, coefficient: f32) -> MmiReranker {
        MmiReranker::new(
            forward_model(),
            reverse_model(),
            MmiParams {
                reverse_model_score_weight: weight,
                repetition_penalization_coefficient: coefficient,
            },
        )
    }

    #[tokio::test]
    async fn test_identity_reranker_passes_through() {
        let reranker = IdentityReranker::new();
        let context = DialogContext::single(vec![3]);
        let reranked = reranker
            .rerank_candidates(&context, candidates())
            .await
            .unwrap();
        assert_eq!(reranked, candidates());
        assert_eq!(reranker.kind(), RerankerKind::Identity);
    }

    #[tokio::test]
    async fn test_mmi_prefers_informative_response() {
        let reranker = mmi(0.5, 1.0);
        let context = DialogContext::single(vec![3]);
        let reranked = reranker
            .rerank_candidates(&context, candidates())
            .await
            .unwrap();

        assert_eq!(reranker.kind(), RerankerKind::Mmi);
        assert_eq!(reranked[0].tokens, vec![4]);
        assert_eq!(reranked[1].tokens, vec![5]);
        assert!(reranked[0].score > reranked[1].score);
    }

    #[tokio::test]
    async fn test_mmi_score_formula() {
        let reranker = mmi(0.5, 1.0);
        let context = DialogContext::single(vec![3]);
        let score = reranker
            .score_candidate(&context, &Candidate::new(vec![4], 0.0))
            .await
            .unwrap();
        // forward: P(fine | how) * P(eos | fine) = 0.3
        // reverse: P(how | fine) * P(eos | how) = 0.9
        let expected = 0.5 * 0.3_f32.ln() + 0.5 * 0.9_f32.ln();
        assert!((score - expected).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_full_reverse_weight_ignores_forward_model() {
        let reranker = mmi(1.0, 1.0);
        let context = DialogContext::single(vec![3]);
        // With w = 1 only the reverse term counts.
        let score = reranker
            .score_candidate(&context, &Candidate::new(vec![4], 0.0))
            .await
            .unwrap();
        assert!((score - 0.9_f32.ln()).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_repetitions_are_penalized() {
        let uniform: Arc<dyn DialogModel> = Arc::new(
            BigramDialogModel::uniform("uniform", 6, SpecialTokens::default()).unwrap(),
        );
        let reranker = MmiReranker::new(
            Arc::clone(&uniform),
            uniform,
            MmiParams {
                reverse_model_score_weight: 0.5,
                repetition_penalization_coefficient: 10.0,
            },
        );
        // Empty context: only the forward term and the repetition penalty count.
        let context = DialogContext::default();
        let once = reranker
            .score_candidate(&context, &Candidate::new(vec![5], 0.0))
            .await
            .unwrap();
        let twice = reranker
            .score_candidate(&context, &Candidate::new(vec![5, 5], 0.0))
            .await
            .unwrap();

        let step = (1.0_f32 / 6.0).ln();
        assert!((once - step).abs() < 1e-5);
        assert!((twice - (1.5 * step - 10.0_f32.ln())).abs() < 1e-5);
    }

    #[tokio::test]
    #[allow(clippy::float_cmp)]
    async fn test_impossible_forward_response_stays_last_above_unit_weight() {
        let special = SpecialTokens::default();
        // After "ok" the forward model loops on "how"/"fine" and never ends.
        let mut weights = vec![vec![1.0; 6]; 6];
        weights[5] = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        weights[3] = vec![0.0, 0.0, 0.0, 0.5, 0.5, 0.0];
        weights[4] = vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let looping: Arc<dyn DialogModel> =
            Arc::new(BigramDialogModel::from_weights("looping", weights, special).unwrap());
        let uniform: Arc<dyn DialogModel> =
            Arc::new(BigramDialogModel::uniform("uniform", 6, special).unwrap());
        let reranker = MmiReranker::new(
            looping,
            uniform,
            MmiParams {
                reverse_model_score_weight: 2.0,
                repetition_penalization_coefficient: 1.0,
            },
        );

        // The last candidate was cut at the length limit: eos cannot follow it.
        let candidates = vec![
            Candidate::new(vec![3, 3, 3], f32::NEG_INFINITY),
            Candidate::new(vec![3, 4], 0.5_f32.ln()),
            Candidate::new(vec![3, 3, 4], 0.25_f32.ln()),
        ];
        let reranked = reranker
            .rerank_candidates(&DialogContext::single(vec![5]), candidates)
            .await
            .unwrap();

        assert_eq!(reranked[0].tokens, vec![3, 3, 4]);
        assert_eq!(reranked[1].tokens, vec![3, 4]);
        assert!(reranked[0].score.is_finite() && reranked[1].score.is_finite());
        assert_eq!(reranked[2].tokens, vec![3, 3, 3]);
        assert_eq!(reranked[2].score, f32::NEG_INFINITY);
    }

    #[tokio::test]
    async fn test_mmi_empty_candidates() {
        let reranker = mmi(0.5, 1.0);
        let reranked = reranker
            .rerank_candidates(&DialogContext::single(vec![3]), Vec::new())
            .await
            .unwrap();
        assert!(reranked.is_empty());
    }
}
