use std::collections::HashMap;
use std::path::Path;

use ndarray::Array2;
use serde::Deserialize;
use tracing::info;

use crate::config::{DatasetConfig, Orientation};
use crate::error::{Result, SadError};
use crate::stream::data_stream::{DataStream, Label};

/// A numeric array as stored in the dataset file, 1-D or 2-D.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawArray {
    Vector(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

/// Feature matrix and label vector, aligned row-wise.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Option<Vec<Label>>,
}

impl Dataset {
    pub fn from_json_file(path: impl AsRef<Path>, config: &DatasetConfig) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SadError::io(path, e))?;
        let dataset = Self::from_json_str(&content, config)?;
        info!(
            path = %path.display(),
            n_samples = dataset.n_samples(),
            n_features = dataset.n_features(),
            labeled = dataset.y.is_some(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Parse a JSON object of named arrays, e.g. `{"X": [[...]], "y": [[...]]}`.
    pub fn from_json_str(json: &str, config: &DatasetConfig) -> Result<Self> {
        let mut arrays: HashMap<String, serde_json::Value> = serde_json::from_str(json)?;

        let raw_x = arrays.remove(&config.features_key).ok_or_else(|| {
            SadError::InvalidConfig(format!(
                "dataset has no array named '{}'",
                config.features_key
            ))
        })?;
        let x = features_matrix(serde_json::from_value(raw_x)?, config.orientation)?;

        let y = match &config.labels_key {
            Some(key) => {
                let raw_y = arrays.remove(key).ok_or_else(|| {
                    SadError::InvalidConfig(format!("dataset has no array named '{key}'"))
                })?;
                let labels = label_vector(serde_json::from_value(raw_y)?)?;
                if labels.len() != x.nrows() {
                    return Err(SadError::malformed(
                        labels.len().min(x.nrows()),
                        format!(
                            "{} feature rows but {} labels",
                            x.nrows(),
                            labels.len()
                        ),
                    ));
                }
                Some(labels)
            }
            None => None,
        };

        Ok(Dataset { x, y })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn into_stream(self) -> Result<DataStream> {
        DataStream::new(self.x, self.y)
    }
}

fn features_matrix(raw: RawArray, orientation: Orientation) -> Result<Array2<f64>> {
    let rows = match raw {
        // A flat array is a single feature observed over time in either layout.
        RawArray::Vector(values) => {
            let n = values.len();
            return Array2::from_shape_vec((n, 1), values)
                .map_err(|e| SadError::malformed(0, e.to_string()));
        }
        RawArray::Matrix(rows) => rows,
    };

    let n_rows = rows.len();
    let n_cols = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(n_rows * n_cols);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != n_cols {
            // In the transposed layout a short row is a short column, so the
            // offending record index is the first missing position.
            let record = match orientation {
                Orientation::SamplesByFeatures => i,
                Orientation::FeaturesBySamples => row.len().min(n_cols),
            };
            return Err(SadError::malformed(
                record,
                format!("ragged matrix: row {i} has {} values, expected {n_cols}", row.len()),
            ));
        }
        flat.extend(row);
    }
    let matrix = Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| SadError::malformed(0, e.to_string()))?;

    Ok(match orientation {
        Orientation::SamplesByFeatures => matrix,
        Orientation::FeaturesBySamples => matrix.t().as_standard_layout().into_owned(),
    })
}

fn label_vector(raw: RawArray) -> Result<Vec<Label>> {
    let values = match raw {
        RawArray::Vector(values) => values,
        RawArray::Matrix(rows) => {
            let n_rows = rows.len();
            if n_rows == 1 || rows.iter().all(|r| r.len() == 1) {
                rows.into_iter().flatten().collect()
            } else {
                return Err(SadError::malformed(
                    0,
                    format!("label array must be 1 x n or n x 1, found {n_rows} rows"),
                ));
            }
        }
    };

    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| Label::from_value(v, row))
        .collect()
}
