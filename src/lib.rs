//! Streaming anomaly detection with prequential evaluation.
//!
//! A replayable [`stream::DataStream`] feeds records one at a time to
//! [`utils::EvaluatePrequential`], which asks a [`models::BaseModel`]
//! (here [`models::HalfSpaceTrees`]) to score each record before learning
//! from it, and accumulates detection metrics past a pretraining window.

pub mod config;
pub mod error;
pub mod models;
pub mod stream;
pub mod utils;

#[cfg(feature = "python")]
mod python;

pub use config::{DatasetConfig, HarnessConfig, HstConfig, Orientation, PrequentialConfig};
pub use error::{Result, SadError};
pub use models::{BaseModel, HalfSpaceTrees};
pub use stream::{DataStream, Dataset, Label, Record, Stream};
pub use utils::{evaluate, EvaluatePrequential, EvaluationResult, StopReason};

/// Load the configured dataset, build Half-Space Trees and evaluate.
///
/// A model `n_features` of 0 is replaced by the dataset's width.
pub fn run(config: &HarnessConfig) -> Result<EvaluationResult> {
    let path = config
        .dataset
        .path
        .as_ref()
        .ok_or_else(|| SadError::InvalidConfig("dataset.path is not set".into()))?;
    let mut stream = Dataset::from_json_file(path, &config.dataset)?.into_stream()?;

    let mut model_config = config.model.clone();
    if model_config.n_features == 0 {
        model_config.n_features = stream.n_features();
    }
    let mut model = HalfSpaceTrees::new(model_config)?;

    EvaluatePrequential::new(config.evaluation.clone())?.evaluate(&mut stream, &mut model)
}
