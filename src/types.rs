//! Core data types used throughout `dialog-inference`.

use serde::{Deserialize, Serialize};

/// Index of a token in a model vocabulary.
pub type TokenId = u32;

/// Special token ids of a vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    /// Padding token.
    pub pad: TokenId,
    /// Start-of-sequence token, used as the previous token of an empty input.
    pub start: TokenId,
    /// End-of-sequence token; terminates a response.
    pub eos: TokenId,
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            pad: 0,
            start: 1,
            eos: 2,
        }
    }
}

impl SpecialTokens {
    /// Whether `token` is one of the special tokens.
    #[must_use]
    pub fn contains(&self, token: TokenId) -> bool {
        token == self.pad || token == self.start || token == self.eos
    }
}

/// A dialog history: utterances in chronological order, each a token sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogContext {
    /// Utterances, oldest first.
    pub utterances: Vec<Vec<TokenId>>,
}

impl DialogContext {
    /// Create a context from utterances.
    #[must_use]
    pub fn new(utterances: Vec<Vec<TokenId>>) -> Self {
        Self { utterances }
    }

    /// Create a context holding a single utterance.
    #[must_use]
    pub fn single(utterance: Vec<TokenId>) -> Self {
        Self {
            utterances: vec![utterance],
        }
    }

    /// Append an utterance.
    #[must_use]
    pub fn with_utterance(mut self, utterance: Vec<TokenId>) -> Self {
        self.utterances.push(utterance);
        self
    }

    /// The most recent utterance, if any.
    #[must_use]
    pub fn last_utterance(&self) -> Option<&[TokenId]> {
        self.utterances.last().map(Vec::as_slice)
    }

    /// The last token of the whole context, skipping empty utterances.
    #[must_use]
    pub fn last_token(&self) -> Option<TokenId> {
        self.utterances
            .iter()
            .rev()
            .find_map(|utterance| utterance.last().copied())
    }

    /// Whether the context holds no tokens at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.utterances.iter().all(Vec::is_empty)
    }
}

/// A candidate response with its score (higher is better).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Response tokens, without the end-of-sequence token.
    pub tokens: Vec<TokenId>,
    /// Log-domain score.
    pub score: f32,
}

impl Candidate {
    /// Create a new candidate.
    #[must_use]
    pub fn new(tokens: Vec<TokenId>, score: f32) -> Self {
        Self { tokens, score }
    }

    /// Number of non-special tokens that repeat an earlier token of the candidate.
    #[must_use]
    pub fn num_repetitions(&self, special: &SpecialTokens) -> usize {
        let mut seen = std::collections::HashSet::new();
        self.tokens
            .iter()
            .filter(|&&token| !special.contains(token))
            .filter(|&&token| !seen.insert(token))
            .count()
    }
}

/// Sort candidates by score, best first. Ties keep their relative order.
pub fn sort_by_score_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_last_token_skips_empty_utterances() {
        let context = DialogContext::new(vec![vec![5, 6], vec![]]);
        assert_eq!(context.last_token(), Some(6));
        assert_eq!(context.last_utterance(), Some(&[][..]));
        assert!(!context.is_empty());
        assert!(DialogContext::default().is_empty());
    }

    #[test]
    fn test_num_repetitions_ignores_special_tokens() {
        let special = SpecialTokens::default();
        let candidate = Candidate::new(vec![5, 6, 5, 5, 0, 0, 7], 0.0);
        assert_eq!(candidate.num_repetitions(&special), 2);
        assert_eq!(Candidate::new(vec![], 0.0).num_repetitions(&special), 0);
    }

    #[test]
    fn test_sort_by_score_is_stable() {
        let mut candidates = vec![
            Candidate::new(vec![3], -2.0),
            Candidate::new(vec![4], -1.0),
            Candidate::new(vec![5], -2.0),
        ];
        sort_by_score_desc(&mut candidates);
        let order: Vec<_> = candidates.iter().map(|c| c.tokens[0]).collect();
        assert_eq!(order, vec![4, 3, 5]);
    }
}
