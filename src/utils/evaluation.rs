use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PrequentialConfig;
use crate::error::{Result, SadError};
use crate::models::BaseModel;
use crate::stream::Stream;
use crate::utils::metrics::{auroc, ConfusionMatrix, Metrics, SlidingWindow};

/// Why an evaluation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSamples,
    /// The stream signalled its end.
    Exhausted,
    /// The stream was already past its end; metrics are partial.
    OutOfData,
    MaxTime,
}

/// Snapshot taken every `n_wait` scored records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint {
    /// Records consumed so far, pretraining included.
    pub sample_id: usize,
    pub n_scored: usize,
    pub global: Metrics,
    /// Metrics over the last `n_wait` scored records.
    pub window: Metrics,
    pub window_auroc: f64,
    pub running_time_secs: f64,
}

/// Final outcome of a prequential run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Records consumed, i.e. score/update pairs performed.
    pub n_samples: usize,
    /// Labeled records past the pretraining window.
    pub n_scored: usize,
    /// Unlabeled records past the pretraining window.
    pub n_unlabeled: usize,
    pub confusion_matrix: ConfusionMatrix,
    pub metrics: Metrics,
    pub auroc: f64,
    pub measurements: Vec<MeasurementPoint>,
    pub running_time_secs: f64,
    pub stop_reason: StopReason,
}

impl EvaluationResult {
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_pretty()?).map_err(|e| SadError::io(path, e))
    }
}

/// Running state of one evaluation.
struct Accumulator {
    n_samples: usize,
    n_unlabeled: usize,
    labels: Vec<bool>,
    scores: Vec<f64>,
    confusion: ConfusionMatrix,
    window: SlidingWindow,
    measurements: Vec<MeasurementPoint>,
}

impl Accumulator {
    fn new(n_wait: usize) -> Self {
        Accumulator {
            n_samples: 0,
            n_unlabeled: 0,
            labels: Vec::new(),
            scores: Vec::new(),
            confusion: ConfusionMatrix::new(),
            window: SlidingWindow::new(n_wait),
            measurements: Vec::new(),
        }
    }

    fn n_scored(&self) -> usize {
        self.labels.len()
    }

    fn record(&mut self, actual_anomaly: bool, score: f64, predicted_anomaly: bool) {
        self.labels.push(actual_anomaly);
        self.scores.push(score);
        self.confusion.record(actual_anomaly, predicted_anomaly);
        self.window.push(actual_anomaly, score, predicted_anomaly);
    }

    fn measure(&mut self, elapsed: Duration) {
        let point = MeasurementPoint {
            sample_id: self.n_samples,
            n_scored: self.n_scored(),
            global: Metrics::from_confusion_matrix(&self.confusion),
            window: Metrics::from_confusion_matrix(&self.window.confusion()),
            window_auroc: self.window.auroc(),
            running_time_secs: elapsed.as_secs_f64(),
        };
        debug!(
            sample_id = point.sample_id,
            accuracy = point.global.accuracy,
            window_f1 = point.window.f1,
            window_auroc = point.window_auroc,
            "measurement point"
        );
        self.measurements.push(point);
    }

    fn finish(self, elapsed: Duration, stop_reason: StopReason) -> EvaluationResult {
        EvaluationResult {
            n_samples: self.n_samples,
            n_scored: self.labels.len(),
            n_unlabeled: self.n_unlabeled,
            confusion_matrix: self.confusion,
            metrics: Metrics::from_confusion_matrix(&self.confusion),
            auroc: auroc(&self.labels, &self.scores),
            measurements: self.measurements,
            running_time_secs: elapsed.as_secs_f64(),
            stop_reason,
        }
    }
}

/// Prequential (test-then-train) evaluation of a streaming anomaly model.
///
/// Every record is first scored, then learned from. The first
/// `pretrain_size` records only warm the model up; records after that are
/// thresholded and compared with their label.
#[derive(Debug, Clone, Default)]
pub struct EvaluatePrequential {
    config: PrequentialConfig,
}

impl EvaluatePrequential {
    pub fn new(config: PrequentialConfig) -> Result<Self> {
        config.validate()?;
        Ok(EvaluatePrequential { config })
    }

    pub fn config(&self) -> &PrequentialConfig {
        &self.config
    }

    /// Run the stream through `model` until `max_samples` records have been
    /// consumed or the stream ends.
    ///
    /// An [`SadError::OutOfData`] from the stream ends the run early with the
    /// metrics collected so far. A record whose width differs from the
    /// stream's declared width aborts the run.
    pub fn evaluate<S, M>(&self, stream: &mut S, model: &mut M) -> Result<EvaluationResult>
    where
        S: Stream + ?Sized,
        M: BaseModel + ?Sized,
    {
        let cfg = &self.config;
        let n_features = stream.n_features();
        if let Some(expected) = model.n_features() {
            if expected != n_features {
                return Err(SadError::InvalidConfig(format!(
                    "model expects {expected} features but stream provides {n_features}"
                )));
            }
        }
        if cfg.restart_stream {
            stream.reset();
        }

        let max_time = cfg.max_time()?;
        info!(
            pretrain_size = cfg.pretrain_size,
            max_samples = cfg.max_samples,
            n_remaining = stream.n_remaining_samples(),
            "prequential evaluation started"
        );

        let start = Instant::now();
        let mut acc = Accumulator::new(cfg.n_wait);
        let stop_reason = loop {
            if acc.n_samples >= cfg.max_samples {
                break StopReason::MaxSamples;
            }
            if max_time.is_some_and(|limit| start.elapsed() >= limit) {
                break StopReason::MaxTime;
            }

            let record = match stream.next_instance() {
                Ok(Some(record)) => record,
                Ok(None) => break StopReason::Exhausted,
                Err(SadError::OutOfData) => {
                    warn!(
                        n_samples = acc.n_samples,
                        "stream ran out of data, returning partial metrics"
                    );
                    break StopReason::OutOfData;
                }
                Err(e) => return Err(e),
            };
            if record.len() != n_features {
                return Err(SadError::malformed(
                    acc.n_samples,
                    format!("expected {n_features} features, found {}", record.len()),
                ));
            }

            let score = model.score_partial(record.features());
            acc.n_samples += 1;
            if acc.n_samples > cfg.pretrain_size {
                match record.label() {
                    Some(label) => {
                        acc.record(label.is_anomaly(), score, score > cfg.threshold);
                        if acc.n_scored() % cfg.n_wait == 0 {
                            acc.measure(start.elapsed());
                        }
                    }
                    None => acc.n_unlabeled += 1,
                }
            }
            model.fit_partial(record.features());
        };

        let result = acc.finish(start.elapsed(), stop_reason);
        info!(
            n_samples = result.n_samples,
            n_scored = result.n_scored,
            accuracy = result.metrics.accuracy,
            precision = result.metrics.precision,
            recall = result.metrics.recall,
            auroc = result.auroc,
            stop_reason = ?result.stop_reason,
            "prequential evaluation finished"
        );

        if let Some(path) = &cfg.output_file {
            result.write_json(path)?;
        }
        Ok(result)
    }
}

/// Evaluate with default settings apart from the two window bounds.
pub fn evaluate<S, M>(
    stream: &mut S,
    model: &mut M,
    pretrain_size: usize,
    max_samples: usize,
) -> Result<EvaluationResult>
where
    S: Stream + ?Sized,
    M: BaseModel + ?Sized,
{
    EvaluatePrequential::new(PrequentialConfig {
        pretrain_size,
        max_samples,
        ..PrequentialConfig::default()
    })?
    .evaluate(stream, model)
}
