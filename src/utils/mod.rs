pub mod evaluation;
pub mod metrics;

pub use evaluation::{evaluate, EvaluatePrequential, EvaluationResult, MeasurementPoint, StopReason};
pub use metrics::{auroc, ConfusionMatrix, Metrics, SlidingWindow};
