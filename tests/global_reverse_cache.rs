//! The process-wide reverse model cache, exercised through `predictor_factory`.
//!
//! Kept in its own test binary so that no other test can populate the global
//! cache first.

use std::sync::Arc;

use dialog_inference::prelude::*;

fn uniform(name: &str) -> Arc<dyn DialogModel> {
    Arc::new(BigramDialogModel::uniform(name, 8, SpecialTokens::default()).unwrap())
}

#[tokio::test]
async fn test_global_cache_loads_reverse_model_once() {
    let provider = MockModelProvider::new().with_reverse(uniform("reverse"));
    let config = PredictionConfig::new()
        .with_beam_size(4)
        .with_max_response_length(5)
        .with_mmi_reverse_model_score_weight(0.5);

    // Non-reranking modes leave the global cache alone.
    predictor_factory(uniform("forward"), "beamsearch", &config, &provider).unwrap();
    assert!(!ReverseModelCache::global().is_populated());
    assert_eq!(provider.load_count(ModelDirection::Reverse), 0);

    // A failed load is reported and not cached.
    provider.set_failing(true);
    let err = predictor_factory(uniform("forward"), "sampling_reranking", &config, &provider)
        .unwrap_err();
    assert!(matches!(err, PredictionError::ReverseModelUnavailable { .. }));
    assert!(!ReverseModelCache::global().is_populated());
    provider.set_failing(false);

    let first =
        predictor_factory(uniform("forward"), "beamsearch_reranking", &config, &provider).unwrap();
    let cached = ReverseModelCache::global().get().unwrap();
    assert_eq!(cached.name(), "reverse");

    // Later reranking predictors reuse the cached instance, even from a
    // provider that has nothing to offer.
    let empty = MockModelProvider::new();
    let second =
        predictor_factory(uniform("forward"), "sampling_reranking", &config, &empty).unwrap();
    assert_eq!(provider.load_count(ModelDirection::Reverse), 2);
    assert_eq!(empty.load_count(ModelDirection::Reverse), 0);
    assert!(Arc::ptr_eq(
        &cached,
        &ReverseModelCache::global().get().unwrap()
    ));

    assert_eq!(first.reranker_kind(), RerankerKind::Mmi);
    assert_eq!(second.reranker_kind(), RerankerKind::Mmi);

    let response = first
        .predict_response(&DialogContext::single(vec![3, 4, 5]))
        .await
        .unwrap();
    assert!(response.tokens.len() <= 5);
}
