//! Log-probability adjustments applied before choosing the next token.

use std::collections::HashSet;

use crate::types::{SpecialTokens, TokenId};

/// Divide the probability of every already used token by `coefficient`.
///
/// Works in the log domain: each distinct non-special token of `used` loses
/// `ln(coefficient)`, then the distribution is renormalized. A coefficient of
/// 1.0 leaves `log_probs` untouched.
pub fn penalize_repetitions(
    log_probs: &mut [f32],
    used: &[TokenId],
    coefficient: f32,
    special: &SpecialTokens,
) {
    if (coefficient - 1.0).abs() <= f32::EPSILON || used.is_empty() {
        return;
    }

    let penalty = coefficient.ln();
    let mut seen = HashSet::new();
    for &token in used {
        if special.contains(token) || !seen.insert(token) {
            continue;
        }
        if let Some(log_prob) = log_probs.get_mut(token as usize) {
            *log_prob -= penalty;
        }
    }

    normalize_log_probs(log_probs);
}

/// Scale a log-distribution by `1 / temperature` and renormalize.
///
/// Temperature < 1.0 sharpens the distribution, > 1.0 flattens it. The most
/// likely token keeps a log-probability of 0 before renormalization, so even a
/// vanishingly small temperature leaves at least one token with weight.
pub fn apply_temperature(log_probs: &mut [f32], temperature: f32) {
    let max = log_probs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return;
    }
    if (temperature - 1.0).abs() > 1e-6 {
        for log_prob in log_probs.iter_mut() {
            *log_prob = (*log_prob - max) / temperature;
        }
    }
    normalize_log_probs(log_probs);
}

/// Shift log-probabilities so that they exponentiate to a sum of one.
///
/// Distributions without a finite entry are left as they are.
pub fn normalize_log_probs(log_probs: &mut [f32]) {
    let max = log_probs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return;
    }
    let log_sum = log_probs
        .iter()
        .map(|log_prob| (log_prob - max).exp())
        .sum::<f32>()
        .ln()
        + max;
    for log_prob in log_probs.iter_mut() {
        *log_prob -= log_sum;
    }
}
