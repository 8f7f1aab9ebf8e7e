//! Response prediction: generate candidates, then rerank them.

use std::sync::Arc;

use futures::future::try_join_all;

use crate::config::GeneratorKind;
use crate::error::PredictionError;
use crate::generation::CandidatesGenerator;
use crate::model::DialogModel;
use crate::reranker::{CandidatesReranker, RerankerKind};
use crate::types::{Candidate, DialogContext};

/// A forward model together with a candidate generator and a reranker.
pub struct Predictor {
    model: Arc<dyn DialogModel>,
    generator: Box<dyn CandidatesGenerator>,
    reranker: Box<dyn CandidatesReranker>,
}

impl Predictor {
    /// Assemble a predictor from its parts.
    #[must_use]
    pub fn new(
        model: Arc<dyn DialogModel>,
        generator: Box<dyn CandidatesGenerator>,
        reranker: Box<dyn CandidatesReranker>,
    ) -> Self {
        Self {
            model,
            generator,
            reranker,
        }
    }

    /// The forward model.
    #[must_use]
    pub fn model(&self) -> &Arc<dyn DialogModel> {
        &self.model
    }

    /// The candidate generator.
    #[must_use]
    pub fn generator(&self) -> &dyn CandidatesGenerator {
        self.generator.as_ref()
    }

    /// The reranker.
    #[must_use]
    pub fn reranker(&self) -> &dyn CandidatesReranker {
        self.reranker.as_ref()
    }

    /// Generator family of this predictor.
    #[must_use]
    pub fn generator_kind(&self) -> GeneratorKind {
        self.generator.kind()
    }

    /// Reranking strategy of this predictor.
    #[must_use]
    pub fn reranker_kind(&self) -> RerankerKind {
        self.reranker.kind()
    }

    /// Predict the best `output_candidates_num` responses for every context.
    ///
    /// Contexts are processed concurrently; results keep the input order.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::InvalidConfig`] if `output_candidates_num`
    /// is zero, or a model error if generation or reranking fails.
    pub async fn predict_responses(
        &self,
        contexts: &[DialogContext],
        output_candidates_num: usize,
    ) -> Result<Vec<Vec<Candidate>>, PredictionError> {
        if output_candidates_num == 0 {
            return Err(PredictionError::InvalidConfig(
                "output_candidates_num should be > 0".to_string(),
            ));
        }

        try_join_all(
            contexts
                .iter()
                .map(|context| self.predict_for_context(context, output_candidates_num)),
        )
        .await
    }

    /// Predict the single best response for `context`.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::NoCandidates`] if nothing was generated, or a
    /// model error if generation or reranking fails.
    pub async fn predict_response(
        &self,
        context: &DialogContext,
    ) -> Result<Candidate, PredictionError> {
        self.predict_for_context(context, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(PredictionError::NoCandidates)
    }

    async fn predict_for_context(
        &self,
        context: &DialogContext,
        output_candidates_num: usize,
    ) -> Result<Vec<Candidate>, PredictionError> {
        let candidates = self.generator.generate_candidates(context).await?;
        let mut reranked = self.reranker.rerank_candidates(context, candidates).await?;
        reranked.truncate(output_candidates_num);
        Ok(reranked)
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("model", &self.model.name())
            .field("generator", &self.generator.kind())
            .field("reranker", &self.reranker.kind())
            .finish()
    }
}
