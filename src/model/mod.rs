//! Dialog models: the model interface, a table-backed model, providers that
//! load trained artifacts, and the process-wide reverse model cache.

pub mod bigram;
pub mod cache;
pub mod provider;
pub mod traits;

pub use bigram::BigramDialogModel;
pub use cache::ReverseModelCache;
pub use provider::{
    DirectoryModelProvider, FORWARD_MODEL_FILE, MockModelProvider, REVERSE_MODEL_FILE,
};
pub use traits::{DialogModel, ModelDirection, TrainedModelProvider};
