use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SadError};

/// Ground-truth class of a record. Only ever read by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Normal,
    Anomalous,
}

impl Label {
    /// Interpret a numeric label the way the dataset stores it: the value is
    /// truncated to an integer and must be 0 or 1.
    pub fn from_value(value: f64, row: usize) -> Result<Self> {
        if !value.is_finite() {
            return Err(SadError::malformed(row, format!("label {value} is not finite")));
        }
        match value as i64 {
            0 => Ok(Label::Normal),
            1 => Ok(Label::Anomalous),
            other => Err(SadError::malformed(
                row,
                format!("label {other} is not binary (expected 0 or 1)"),
            )),
        }
    }

    pub fn is_anomaly(self) -> bool {
        matches!(self, Label::Anomalous)
    }
}

/// One labeled feature vector read from a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    features: Vec<f64>,
    label: Option<Label>,
}

impl Record {
    pub fn new(features: Vec<f64>, label: Option<Label>) -> Self {
        Record { features, label }
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn label(&self) -> Option<Label> {
        self.label
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// An ordered, replayable source of records.
///
/// `next_instance` yields `Ok(None)` once when the cursor reaches the end.
/// Reading again without a `reset` fails with [`SadError::OutOfData`].
pub trait Stream {
    fn next_instance(&mut self) -> Result<Option<Record>>;

    /// Rewind to the first record. Safe to call any number of times.
    fn reset(&mut self);

    fn n_features(&self) -> usize;

    fn n_samples(&self) -> usize;

    /// Index of the next record to be returned.
    fn sample_idx(&self) -> usize;

    fn n_remaining_samples(&self) -> usize {
        self.n_samples().saturating_sub(self.sample_idx())
    }

    fn has_more_samples(&self) -> bool {
        self.n_remaining_samples() > 0
    }

    /// Read up to `batch_size` records. Returns fewer when the stream ends.
    fn next_sample(&mut self, batch_size: usize) -> Result<Vec<Record>> {
        let mut batch = Vec::with_capacity(batch_size);
        while batch.len() < batch_size {
            match self.next_instance()? {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        Ok(batch)
    }
}

/// In-memory stream over a feature matrix (rows are records) and an
/// optional label vector aligned row-wise.
#[derive(Debug, Clone)]
pub struct DataStream {
    x: Array2<f64>,
    y: Option<Vec<Label>>,
    feature_names: Option<Vec<String>>,
    sample_idx: usize,
    exhausted: bool,
}

impl DataStream {
    /// Build a stream, validating the whole matrix up front so that a bad
    /// row aborts the run before any evaluation happens.
    pub fn new(x: Array2<f64>, y: Option<Vec<Label>>) -> Result<Self> {
        let (n_samples, n_features) = x.dim();
        if n_samples > 0 && n_features == 0 {
            return Err(SadError::malformed(0, "record has no features"));
        }
        if let Some(labels) = &y {
            if labels.len() != n_samples {
                return Err(SadError::malformed(
                    labels.len().min(n_samples),
                    format!(
                        "feature matrix has {n_samples} rows but label vector has {} entries",
                        labels.len()
                    ),
                ));
            }
        }
        for (row, values) in x.outer_iter().enumerate() {
            if let Some(col) = values.iter().position(|v| !v.is_finite()) {
                return Err(SadError::malformed(
                    row,
                    format!("feature {col} is not finite"),
                ));
            }
        }

        Ok(DataStream {
            x,
            y,
            feature_names: None,
            sample_idx: 0,
            exhausted: false,
        })
    }

    /// Attach column names; their count must match the feature count.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self> {
        if names.len() != self.x.ncols() {
            return Err(SadError::InvalidConfig(format!(
                "{} feature names given for {} features",
                names.len(),
                self.x.ncols()
            )));
        }
        self.feature_names = Some(names);
        Ok(self)
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn is_labeled(&self) -> bool {
        self.y.is_some()
    }

    pub fn row(&self, idx: usize) -> Option<ArrayView1<'_, f64>> {
        (idx < self.x.nrows()).then(|| self.x.row(idx))
    }
}

impl Stream for DataStream {
    fn next_instance(&mut self) -> Result<Option<Record>> {
        if self.exhausted {
            return Err(SadError::OutOfData);
        }
        if self.sample_idx >= self.x.nrows() {
            self.exhausted = true;
            return Ok(None);
        }

        let idx = self.sample_idx;
        self.sample_idx += 1;
        let features = self.x.row(idx).to_vec();
        let label = self.y.as_ref().map(|labels| labels[idx]);
        Ok(Some(Record::new(features, label)))
    }

    fn reset(&mut self) {
        self.sample_idx = 0;
        self.exhausted = false;
    }

    fn n_features(&self) -> usize {
        self.x.ncols()
    }

    fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    fn sample_idx(&self) -> usize {
        self.sample_idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_stream() -> DataStream {
        let x = array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]];
        let y = vec![Label::Normal, Label::Anomalous, Label::Normal];
        DataStream::new(x, Some(y)).unwrap()
    }

    #[test]
    fn yields_rows_in_order_then_signals_exhaustion() {
        let mut stream = small_stream();
        let first = stream.next_instance().unwrap().unwrap();
        assert_eq!(first.features(), &[0.1, 0.2]);
        assert_eq!(first.label(), Some(Label::Normal));
        let second = stream.next_instance().unwrap().unwrap();
        assert_eq!(second.label(), Some(Label::Anomalous));
        stream.next_instance().unwrap().unwrap();

        assert!(!stream.has_more_samples());
        assert!(stream.next_instance().unwrap().is_none());
        assert!(matches!(stream.next_instance(), Err(SadError::OutOfData)));
    }

    #[test]
    fn reset_rewinds_and_is_idempotent() {
        let mut stream = small_stream();
        while stream.next_instance().unwrap().is_some() {}
        stream.reset();
        stream.reset();
        assert_eq!(stream.sample_idx(), 0);
        assert_eq!(stream.n_remaining_samples(), 3);
        let first = stream.next_instance().unwrap().unwrap();
        assert_eq!(first.features(), &[0.1, 0.2]);
    }

    #[test]
    fn next_sample_returns_short_batch_at_the_end() {
        let mut stream = small_stream();
        assert_eq!(stream.next_sample(2).unwrap().len(), 2);
        assert_eq!(stream.next_sample(2).unwrap().len(), 1);
        assert!(stream.next_sample(2).unwrap().is_empty());
        assert!(matches!(stream.next_sample(2), Err(SadError::OutOfData)));
    }

    #[test]
    fn label_count_mismatch_is_malformed() {
        let x = array![[0.1], [0.2]];
        let err = DataStream::new(x, Some(vec![Label::Normal])).unwrap_err();
        assert!(matches!(err, SadError::MalformedRecord { row: 1, .. }));
    }

    #[test]
    fn non_finite_feature_is_malformed() {
        let x = array![[0.1, 0.2], [f64::NAN, 0.4]];
        let err = DataStream::new(x, None).unwrap_err();
        assert!(matches!(err, SadError::MalformedRecord { row: 1, .. }));
    }

    #[test]
    fn label_from_value_truncates_and_rejects_non_binary() {
        assert_eq!(Label::from_value(1.0, 0).unwrap(), Label::Anomalous);
        assert_eq!(Label::from_value(0.0, 0).unwrap(), Label::Normal);
        assert!(Label::from_value(2.0, 4).is_err());
        assert!(Label::from_value(f64::NAN, 4).is_err());
    }

    #[test]
    fn empty_stream_is_exhausted_immediately() {
        let mut stream = DataStream::new(Array2::zeros((0, 3)), None).unwrap();
        assert_eq!(stream.n_features(), 3);
        assert!(stream.next_instance().unwrap().is_none());
    }

    #[test]
    fn feature_names_must_match_width() {
        let stream = small_stream();
        assert!(stream
            .clone()
            .with_feature_names(vec!["duration".into()])
            .is_err());
        let named = stream
            .with_feature_names(vec!["src_bytes".into(), "dst_bytes".into()])
            .unwrap();
        assert_eq!(named.feature_names().unwrap()[1], "dst_bytes");
    }
}
