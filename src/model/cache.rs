//! Process-wide cache for the reverse model used by MMI reranking.
//!
//! The slot starts empty, is filled on the first successful load and is never
//! cleared. A failed load leaves it empty so that a later call can try again.
//! Concurrent first callers are serialized: exactly one of them loads, the
//! others block and then observe the cached instance.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Instant;

use super::traits::{DialogModel, ModelDirection, TrainedModelProvider};
use crate::error::PredictionError;

static GLOBAL_REVERSE_MODEL_CACHE: ReverseModelCache = ReverseModelCache::new();

/// Lazily populated, single-slot holder of the reverse model.
pub struct ReverseModelCache {
    slot: OnceLock<Arc<dyn DialogModel>>,
    init_lock: Mutex<()>,
}

impl ReverseModelCache {
    /// Create an empty cache.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// The cache shared by the whole process.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_REVERSE_MODEL_CACHE
    }

    /// The cached reverse model, if one has been loaded.
    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn DialogModel>> {
        self.slot.get().cloned()
    }

    /// Whether a reverse model has been loaded.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Return the cached reverse model, loading it through `provider` on first use.
    ///
    /// # Errors
    ///
    /// Returns [`PredictionError::ReverseModelUnavailable`] if the provider
    /// cannot load the reverse model. The failure is not cached.
    pub fn get_or_load(
        &self,
        provider: &dyn TrainedModelProvider,
    ) -> Result<Arc<dyn DialogModel>, PredictionError> {
        if let Some(model) = self.slot.get() {
            return Ok(Arc::clone(model));
        }

        // Holding the lock across the load keeps concurrent first callers out.
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = self.slot.get() {
            return Ok(Arc::clone(model));
        }

        tracing::info!("Loading reverse dialog model for MMI reranking");
        let started = Instant::now();
        let model = provider
            .load_trained_model(ModelDirection::Reverse)
            .map_err(|source| {
                tracing::warn!(error = %source, "Reverse dialog model is unavailable");
                PredictionError::ReverseModelUnavailable { source }
            })?;
        tracing::info!(
            model = model.name(),
            elapsed_ms = started.elapsed().as_millis(),
            "Reverse dialog model loaded"
        );

        Ok(Arc::clone(self.slot.get_or_init(|| model)))
    }
}

impl Default for ReverseModelCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReverseModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseModelCache")
            .field("model", &self.slot.get().map(|model| model.name().to_string()))
            .finish()
    }
}
