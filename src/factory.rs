//! Predictor assembly from a prediction mode and a configuration.
//!
//! Validation happens before anything is constructed: the mode first, then the
//! parameters the mode uses, including the MMI weight for reranking modes.
//! The reverse model is only requested for reranking modes, through a
//! [`ReverseModelCache`] so that it is loaded at most once.

use std::sync::Arc;

use crate::config::{PredictionConfig, PredictionMode};
use crate::error::PredictionError;
use crate::generation::{
    BeamSearchCandidatesGenerator, CandidatesGenerator, SamplingCandidatesGenerator,
};
use crate::model::{DialogModel, ReverseModelCache, TrainedModelProvider};
use crate::predictor::Predictor;
use crate::reranker::{CandidatesReranker, IdentityReranker, MmiReranker};

/// Builds [`Predictor`]s, loading the reverse model through a shared cache.
#[derive(Clone, Copy)]
pub struct PredictorFactory<'a> {
    provider: &'a dyn TrainedModelProvider,
    reverse_cache: &'a ReverseModelCache,
}

impl<'a> PredictorFactory<'a> {
    /// Create a factory using the process-wide reverse model cache.
    #[must_use]
    pub fn new(provider: &'a dyn TrainedModelProvider) -> Self {
        Self {
            provider,
            reverse_cache: ReverseModelCache::global(),
        }
    }

    /// Use `cache` instead of the process-wide reverse model cache.
    #[must_use]
    pub fn with_reverse_cache(mut self, cache: &'a ReverseModelCache) -> Self {
        self.reverse_cache = cache;
        self
    }

    /// Build a predictor for a mode given by name.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::InvalidMode`] for an unknown mode, and any
    /// error of [`PredictorFactory::build_for_mode`].
    pub fn build(
        &self,
        model: Arc<dyn DialogModel>,
        mode: &str,
        config: &PredictionConfig,
    ) -> Result<Predictor, PredictionError> {
        let mode = mode.parse::<PredictionMode>()?;
        self.build_for_mode(model, mode, config)
    }

    /// Build a predictor for `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::InvalidConfig`] if a parameter used by the
    /// mode is out of range, [`PredictionError::InvalidWeight`] if a reranking
    /// mode has a non-positive reverse model weight, and
    /// [`PredictionError::ReverseModelUnavailable`] if a reranking mode needs a
    /// reverse model that cannot be loaded.
    pub fn build_for_mode(
        &self,
        model: Arc<dyn DialogModel>,
        mode: PredictionMode,
        config: &PredictionConfig,
    ) -> Result<Predictor, PredictionError> {
        tracing::debug!(%mode, model = model.name(), "Building predictor");

        let (generator, reranker): (Box<dyn CandidatesGenerator>, Box<dyn CandidatesReranker>) =
            match mode {
                PredictionMode::Beamsearch => {
                    let params = config.beam_search_params()?;
                    (
                        Box::new(BeamSearchCandidatesGenerator::new(Arc::clone(&model), params)),
                        Box::new(IdentityReranker::new()),
                    )
                }
                PredictionMode::BeamsearchReranking => {
                    let params = config.beam_search_params()?;
                    let reranker = self.mmi_reranker(&model, config)?;
                    (
                        Box::new(BeamSearchCandidatesGenerator::new(Arc::clone(&model), params)),
                        Box::new(reranker),
                    )
                }
                PredictionMode::Sampling => {
                    let params = config.sampling_params()?;
                    (
                        Box::new(SamplingCandidatesGenerator::new(Arc::clone(&model), params)),
                        Box::new(IdentityReranker::new()),
                    )
                }
                PredictionMode::SamplingReranking => {
                    let params = config.sampling_params()?;
                    let reranker = self.mmi_reranker(&model, config)?;
                    (
                        Box::new(SamplingCandidatesGenerator::new(Arc::clone(&model), params)),
                        Box::new(reranker),
                    )
                }
            };

        tracing::info!(
            %mode,
            generator = ?generator.kind(),
            reranker = ?reranker.kind(),
            "Predictor assembled"
        );
        Ok(Predictor::new(model, generator, reranker))
    }

    /// Validate the MMI weight, then fetch the reverse model.
    fn mmi_reranker(
        &self,
        model: &Arc<dyn DialogModel>,
        config: &PredictionConfig,
    ) -> Result<MmiReranker, PredictionError> {
        let params = config.mmi_params()?;
        let reverse_model = self.reverse_cache.get_or_load(self.provider)?;
        Ok(MmiReranker::new(Arc::clone(model), reverse_model, params))
    }
}

impl std::fmt::Debug for PredictorFactory<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictorFactory")
            .field("reverse_cache", self.reverse_cache)
            .finish_non_exhaustive()
    }
}

/// Build a predictor with the process-wide reverse model cache.
///
/// # Errors
///
/// See [`PredictorFactory::build`].
pub fn predictor_factory(
    model: Arc<dyn DialogModel>,
    mode: &str,
    config: &PredictionConfig,
    provider: &dyn TrainedModelProvider,
) -> Result<Predictor, PredictionError> {
    PredictorFactory::new(provider).build(model, mode, config)
}
