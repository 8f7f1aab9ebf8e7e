//! Trained model providers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::bigram::BigramDialogModel;
use super::traits::{DialogModel, ModelDirection, TrainedModelProvider};
use crate::error::ModelError;

/// File name of the forward model inside a model directory.
pub const FORWARD_MODEL_FILE: &str = "dialog_model.json";

/// File name of the reverse model inside a model directory.
pub const REVERSE_MODEL_FILE: &str = "dialog_model_reverse.json";

/// Loads [`BigramDialogModel`] artifacts from a directory.
#[derive(Debug, Clone)]
pub struct DirectoryModelProvider {
    model_dir: PathBuf,
}

impl DirectoryModelProvider {
    /// Create a provider reading from `model_dir`.
    #[must_use]
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
        }
    }

    /// The directory models are read from.
    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Path of the artifact for `direction`.
    #[must_use]
    pub fn model_path(&self, direction: ModelDirection) -> PathBuf {
        let file = match direction {
            ModelDirection::Forward => FORWARD_MODEL_FILE,
            ModelDirection::Reverse => REVERSE_MODEL_FILE,
        };
        self.model_dir.join(file)
    }
}

impl TrainedModelProvider for DirectoryModelProvider {
    fn load_trained_model(
        &self,
        direction: ModelDirection,
    ) -> Result<Arc<dyn DialogModel>, ModelError> {
        let path = self.model_path(direction);
        tracing::debug!(?direction, path = %path.display(), "Loading trained dialog model");
        let model = BigramDialogModel::from_file(&path)?;
        Ok(Arc::new(model))
    }
}

/// A provider for tests that hands out fixed models and counts loads.
pub struct MockModelProvider {
    forward: Option<Arc<dyn DialogModel>>,
    reverse: Option<Arc<dyn DialogModel>>,
    failing: AtomicBool,
    forward_loads: AtomicUsize,
    reverse_loads: AtomicUsize,
}

impl MockModelProvider {
    /// Create a provider with no models; every load fails.
    #[must_use]
    pub fn new() -> Self {
        Self {
            forward: None,
            reverse: None,
            failing: AtomicBool::new(false),
            forward_loads: AtomicUsize::new(0),
            reverse_loads: AtomicUsize::new(0),
        }
    }

    /// Set the forward model.
    #[must_use]
    pub fn with_forward(mut self, model: Arc<dyn DialogModel>) -> Self {
        self.forward = Some(model);
        self
    }

    /// Set the reverse model.
    #[must_use]
    pub fn with_reverse(mut self, model: Arc<dyn DialogModel>) -> Self {
        self.reverse = Some(model);
        self
    }

    /// Make every subsequent load fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of load attempts for `direction`, failed ones included.
    #[must_use]
    pub fn load_count(&self, direction: ModelDirection) -> usize {
        match direction {
            ModelDirection::Forward => self.forward_loads.load(Ordering::SeqCst),
            ModelDirection::Reverse => self.reverse_loads.load(Ordering::SeqCst),
        }
    }
}

impl Default for MockModelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockModelProvider")
            .field("has_forward", &self.forward.is_some())
            .field("has_reverse", &self.reverse.is_some())
            .field("failing", &self.failing.load(Ordering::SeqCst))
            .field("forward_loads", &self.forward_loads)
            .field("reverse_loads", &self.reverse_loads)
            .finish()
    }
}

impl TrainedModelProvider for MockModelProvider {
    fn load_trained_model(
        &self,
        direction: ModelDirection,
    ) -> Result<Arc<dyn DialogModel>, ModelError> {
        let (counter, model, file) = match direction {
            ModelDirection::Forward => (&self.forward_loads, &self.forward, FORWARD_MODEL_FILE),
            ModelDirection::Reverse => (&self.reverse_loads, &self.reverse, REVERSE_MODEL_FILE),
        };
        counter.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(ModelError::Load(format!("mock provider refused {file}")));
        }
        model
            .clone()
            .ok_or_else(|| ModelError::NotFound(PathBuf::from(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpecialTokens;

    fn uniform(name: &str) -> Arc<dyn DialogModel> {
        Arc::new(BigramDialogModel::uniform(name, 4, SpecialTokens::default()).unwrap())
    }

    #[test]
    fn test_directory_provider_paths() {
        let provider = DirectoryModelProvider::new("models");
        assert_eq!(
            provider.model_path(ModelDirection::Forward),
            PathBuf::from("models/dialog_model.json")
        );
        assert_eq!(
            provider.model_path(ModelDirection::Reverse),
            PathBuf::from("models/dialog_model_reverse.json")
        );
    }

    #[test]
    fn test_directory_provider_loads_both_directions() {
        let dir = tempfile::tempdir().unwrap();
        let forward = BigramDialogModel::uniform("fwd", 4, SpecialTokens::default()).unwrap();
        let reverse = BigramDialogModel::uniform("rev", 4, SpecialTokens::default()).unwrap();
        forward.to_file(dir.path().join(FORWARD_MODEL_FILE)).unwrap();
        reverse.to_file(dir.path().join(REVERSE_MODEL_FILE)).unwrap();

        let provider = DirectoryModelProvider::new(dir.path());
        let loaded = provider.load_trained_model(ModelDirection::Reverse).unwrap();
        assert_eq!(loaded.name(), "rev");
        let loaded = provider.load_trained_model(ModelDirection::Forward).unwrap();
        assert_eq!(loaded.name(), "fwd");
    }

    #[test]
    fn test_directory_provider_missing_reverse_model() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirectoryModelProvider::new(dir.path());
        let err = provider
            .load_trained_model(ModelDirection::Reverse)
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::NotFound(path) if path.ends_with(REVERSE_MODEL_FILE)));
    }

    #[test]
    fn test_mock_provider_counts_and_fails() {
        let provider = MockModelProvider::new().with_reverse(uniform("rev"));
        assert!(provider.load_trained_model(ModelDirection::Reverse).is_ok());
        assert!(provider.load_trained_model(ModelDirection::Forward).is_err());

        provider.set_failing(true);
        assert!(provider.load_trained_model(ModelDirection::Reverse).is_err());

        assert_eq!(provider.load_count(ModelDirection::Reverse), 2);
        assert_eq!(provider.load_count(ModelDirection::Forward), 1);
    }

    #[test]
    fn test_closure_provider() {
        let provider = |direction: ModelDirection| -> Result<Arc<dyn DialogModel>, ModelError> {
            match direction {
                ModelDirection::Forward => Ok(uniform("closure")),
                ModelDirection::Reverse => Err(ModelError::Load("no reverse".into())),
            }
        };
        assert!(provider.load_trained_model(ModelDirection::Forward).is_ok());
        assert!(provider.load_trained_model(ModelDirection::Reverse).is_err());
    }
}
