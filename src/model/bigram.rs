//! A next-token table model conditioned on the previous token.
//!
//! The first response token is conditioned on the last token of the context,
//! or on the start token when the context is empty. The same structure serves
//! as a forward model (context → response) and as a reverse model
//! (response → context).

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traits::DialogModel;
use crate::error::ModelError;
use crate::types::{DialogContext, SpecialTokens, TokenId};

/// On-disk representation of a [`BigramDialogModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BigramModelFile {
    name: String,
    special_tokens: SpecialTokens,
    /// Unnormalized transition weights, `weights[previous][next]`.
    weights: Vec<Vec<f32>>,
}

/// Dialog model backed by a previous-token → next-token table.
#[derive(Debug, Clone)]
pub struct BigramDialogModel {
    name: String,
    special_tokens: SpecialTokens,
    weights: Vec<Vec<f32>>,
    log_probs: Vec<Vec<f32>>,
}

impl BigramDialogModel {
    /// Build a model from unnormalized transition weights.
    ///
    /// `weights[previous][next]` must form a square, non-negative matrix whose
    /// rows each have a positive sum.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidWeights`] if the matrix is malformed or a
    /// special token is out of vocabulary.
    pub fn from_weights(
        name: impl Into<String>,
        weights: Vec<Vec<f32>>,
        special_tokens: SpecialTokens,
    ) -> Result<Self, ModelError> {
        let vocab_size = weights.len();
        if vocab_size == 0 {
            return Err(ModelError::InvalidWeights("empty vocabulary".to_string()));
        }
        for special in [special_tokens.pad, special_tokens.start, special_tokens.eos] {
            if special as usize >= vocab_size {
                return Err(ModelError::InvalidWeights(format!(
                    "special token {special} is outside a vocabulary of {vocab_size}"
                )));
            }
        }

        let mut log_probs = Vec::with_capacity(vocab_size);
        for (previous, row) in weights.iter().enumerate() {
            if row.len() != vocab_size {
                return Err(ModelError::InvalidWeights(format!(
                    "row {previous} has {} entries, expected {vocab_size}",
                    row.len()
                )));
            }
            if row.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(ModelError::InvalidWeights(format!(
                    "row {previous} holds a negative or non-finite weight"
                )));
            }
            let total: f32 = row.iter().sum();
            if total <= 0.0 {
                return Err(ModelError::InvalidWeights(format!(
                    "row {previous} has no probability mass"
                )));
            }
            log_probs.push(row.iter().map(|w| (w / total).ln()).collect());
        }

        Ok(Self {
            name: name.into(),
            special_tokens,
            weights,
            log_probs,
        })
    }

    /// A model assigning equal probability to every next token.
    ///
    /// # Errors
    ///
    /// Returns an error if a special token does not fit in `vocab_size`.
    pub fn uniform(
        name: impl Into<String>,
        vocab_size: usize,
        special_tokens: SpecialTokens,
    ) -> Result<Self, ModelError> {
        Self::from_weights(name, vec![vec![1.0; vocab_size]; vocab_size], special_tokens)
    }

    /// Load a model from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the file does not exist and
    /// [`ModelError::Load`] if it cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Load(format!("{}: {e}", path.display())))?;
        let file: BigramModelFile = serde_json::from_str(&content)
            .map_err(|e| ModelError::Load(format!("{}: {e}", path.display())))?;
        Self::from_weights(file.name, file.weights, file.special_tokens)
    }

    /// Save the model to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Load`] if the file cannot be written.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let file = BigramModelFile {
            name: self.name.clone(),
            special_tokens: self.special_tokens,
            weights: self.weights.clone(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| ModelError::Load(format!("{}: {e}", path.display())))?;
        std::fs::write(path, content)
            .map_err(|e| ModelError::Load(format!("{}: {e}", path.display())))
    }

    fn previous_token(&self, context: &DialogContext, prefix: &[TokenId]) -> TokenId {
        prefix
            .last()
            .copied()
            .or_else(|| context.last_token())
            .unwrap_or(self.special_tokens.start)
    }
}

#[async_trait]
impl DialogModel for BigramDialogModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn vocab_size(&self) -> usize {
        self.log_probs.len()
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special_tokens
    }

    async fn next_token_log_probs(
        &self,
        context: &DialogContext,
        prefix: &[TokenId],
    ) -> Result<Vec<f32>, ModelError> {
        let previous = self.previous_token(context, prefix);
        self.log_probs
            .get(previous as usize)
            .cloned()
            .ok_or(ModelError::UnknownToken {
                token: previous,
                vocab_size: self.log_probs.len(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn chain_model() -> BigramDialogModel {
        // 0 pad, 1 start, 2 eos, 3 → 4 → eos
        let mut weights = vec![vec![1.0; 5]; 5];
        weights[1] = vec![0.0, 0.0, 0.0, 1.0, 0.0];
        weights[3] = vec![0.0, 0.0, 0.0, 0.0, 1.0];
        weights[4] = vec![0.0, 0.0, 1.0, 0.0, 0.0];
        BigramDialogModel::from_weights("chain", weights, SpecialTokens::default()).unwrap()
    }

    #[tokio::test]
    async fn test_next_token_uses_context_then_prefix() {
        let model = chain_model();
        let empty = DialogContext::default();

        let first = model.next_token_log_probs(&empty, &[]).await.unwrap();
        assert_eq!(first[3], 0.0);

        let context = DialogContext::single(vec![3]);
        let after_context = model.next_token_log_probs(&context, &[]).await.unwrap();
        assert_eq!(after_context[4], 0.0);

        let after_prefix = model.next_token_log_probs(&context, &[4]).await.unwrap();
        assert_eq!(after_prefix[2], 0.0);
    }

    #[tokio::test]
    async fn test_sequence_log_likelihood() {
        let model = chain_model();
        let empty = DialogContext::default();
        assert_eq!(model.sequence_log_likelihood(&empty, &[3, 4]).await.unwrap(), 0.0);
        assert_eq!(
            model.sequence_log_likelihood(&empty, &[4]).await.unwrap(),
            f32::NEG_INFINITY
        );
    }

    #[tokio::test]
    async fn test_unknown_token_in_response() {
        let model = chain_model();
        let err = model
            .sequence_log_likelihood(&DialogContext::default(), &[3, 42])
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownToken { token: 42, .. }));
    }

    #[test]
    fn test_invalid_weights() {
        let special = SpecialTokens::default();
        assert!(BigramDialogModel::from_weights("m", vec![], special).is_err());
        assert!(BigramDialogModel::from_weights("m", vec![vec![1.0; 3]; 2], special).is_err());
        let mut weights = vec![vec![1.0; 3]; 3];
        weights[1][0] = -1.0;
        assert!(BigramDialogModel::from_weights("m", weights, special).is_err());
        assert!(BigramDialogModel::from_weights("m", vec![vec![0.0; 3]; 3], special).is_err());
        assert!(BigramDialogModel::uniform("m", 2, special).is_err());
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        chain_model().to_file(&path).unwrap();

        let loaded = BigramDialogModel::from_file(&path).unwrap();
        assert_eq!(loaded.name(), "chain");
        assert_eq!(loaded.vocab_size(), 5);
        let log_probs = loaded
            .next_token_log_probs(&DialogContext::default(), &[])
            .await
            .unwrap();
        assert_eq!(log_probs[3], 0.0);
    }

    #[test]
    fn test_missing_file() {
        let err = BigramDialogModel::from_file("/nonexistent/model.json").unwrap_err();
        assert!(matches!(err, ModelError::NotFound(_)));
    }
}
