//! Traits for dialog models and the providers that load them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::{DialogContext, SpecialTokens, TokenId};

/// Which way a model was trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelDirection {
    /// Predicts a response from its context.
    Forward,
    /// Predicts the context from a response; used for MMI reranking.
    Reverse,
}

/// A trained dialog model that scores next tokens.
#[async_trait]
pub trait DialogModel: Send + Sync {
    /// Human-readable model name.
    fn name(&self) -> &str;

    /// Number of tokens in the vocabulary.
    fn vocab_size(&self) -> usize;

    /// Special tokens of the vocabulary.
    fn special_tokens(&self) -> SpecialTokens;

    /// Log-probabilities of every vocabulary token following `prefix`.
    ///
    /// # Arguments
    /// * `context` - The dialog history the response is conditioned on
    /// * `prefix` - Response tokens generated so far
    ///
    /// # Returns
    /// A vector of `vocab_size()` log-probabilities.
    async fn next_token_log_probs(
        &self,
        context: &DialogContext,
        prefix: &[TokenId],
    ) -> Result<Vec<f32>, ModelError>;

    /// Log-likelihood of `response` followed by the end-of-sequence token.
    async fn sequence_log_likelihood(
        &self,
        context: &DialogContext,
        response: &[TokenId],
    ) -> Result<f32, ModelError> {
        let eos = self.special_tokens().eos;
        let mut prefix = Vec::with_capacity(response.len());
        let mut total = 0.0;

        for &token in response.iter().chain(std::iter::once(&eos)) {
            let log_probs = self.next_token_log_probs(context, &prefix).await?;
            let log_prob = log_probs
                .get(token as usize)
                .copied()
                .ok_or(ModelError::UnknownToken {
                    token,
                    vocab_size: log_probs.len(),
                })?;
            total += log_prob;
            prefix.push(token);
        }

        Ok(total)
    }
}

/// Loads trained models. Loading may block on I/O.
pub trait TrainedModelProvider: Send + Sync {
    /// Load the trained model for `direction`.
    ///
    /// # Errors
    ///
    /// Returns an error if no usable trained artifact exists.
    fn load_trained_model(
        &self,
        direction: ModelDirection,
    ) -> Result<Arc<dyn DialogModel>, ModelError>;
}

impl<F> TrainedModelProvider for F
where
    F: Fn(ModelDirection) -> Result<Arc<dyn DialogModel>, ModelError> + Send + Sync,
{
    fn load_trained_model(
        &self,
        direction: ModelDirection,
    ) -> Result<Arc<dyn DialogModel>, ModelError> {
        self(direction)
    }
}
