//! Configuration for the dataset, the Half-Space Trees model and the
//! prequential evaluator.
//!
//! Every parameter is carried explicitly into the component that uses it,
//! including the random seed. All sections can be read from a TOML file:
//!
//! ```toml
//! [dataset]
//! path = "http.json"
//! orientation = "features_by_samples"
//!
//! [model]
//! n_features = 3
//! random_state = 42
//!
//! [evaluation]
//! pretrain_size = 250
//! max_samples = 1000000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SadError};

/// How the feature matrix is laid out in the dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// One row per record.
    #[default]
    SamplesByFeatures,
    /// One row per feature (MATLAB/HDF5 export); transposed on load.
    FeaturesBySamples,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: Option<PathBuf>,
    pub orientation: Orientation,
    pub features_key: String,
    /// `None` loads an unlabeled stream.
    pub labels_key: Option<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            path: None,
            orientation: Orientation::SamplesByFeatures,
            features_key: "X".to_string(),
            labels_key: Some("y".to_string()),
        }
    }
}

/// Half-Space Trees parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HstConfig {
    /// Dimensionality of the records. `0` means "take it from the stream"
    /// when the model is built by [`crate::run`].
    pub n_features: usize,
    /// Records per mass window.
    pub window_size: usize,
    /// Height of every tree.
    pub depth: usize,
    pub n_estimators: usize,
    /// A node with less reference mass than this stops the scoring walk.
    pub size_limit: usize,
    pub random_state: Option<u64>,
    /// Optional `(min, max)` per feature. Without it features are assumed to
    /// be scaled to [0, 1] and work ranges are drawn at random.
    pub limits: Option<Vec<(f64, f64)>>,
}

impl Default for HstConfig {
    fn default() -> Self {
        HstConfig {
            n_features: 0,
            window_size: 250,
            depth: 15,
            n_estimators: 25,
            size_limit: 50,
            random_state: None,
            limits: None,
        }
    }
}

impl HstConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_features == 0 {
            return Err(SadError::InvalidConfig("n_features must be at least 1".into()));
        }
        if self.window_size == 0 {
            return Err(SadError::InvalidConfig("window_size must be at least 1".into()));
        }
        if self.n_estimators == 0 {
            return Err(SadError::InvalidConfig("n_estimators must be at least 1".into()));
        }
        // 2^(depth + 1) nodes per tree must stay addressable.
        if self.depth >= 30 {
            return Err(SadError::InvalidConfig(format!(
                "depth {} is too large (max 29)",
                self.depth
            )));
        }
        if let Some(limits) = &self.limits {
            if limits.len() != self.n_features {
                return Err(SadError::InvalidConfig(format!(
                    "{} limits given for {} features",
                    limits.len(),
                    self.n_features
                )));
            }
            for (i, (lo, hi)) in limits.iter().enumerate() {
                if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                    return Err(SadError::InvalidConfig(format!(
                        "limits for feature {i} must satisfy min < max, got ({lo}, {hi})"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Prequential (test-then-train) evaluation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrequentialConfig {
    /// Leading records that train the model but are left out of the metrics.
    pub pretrain_size: usize,
    pub max_samples: usize,
    /// Scored records between two measurement points, and the width of the
    /// sliding metrics window.
    pub n_wait: usize,
    /// Scores strictly above this are predicted anomalous.
    pub threshold: f64,
    /// Rewind the stream before evaluating.
    pub restart_stream: bool,
    pub max_time_secs: Option<f64>,
    /// Where to write the final result as JSON.
    pub output_file: Option<PathBuf>,
}

impl Default for PrequentialConfig {
    fn default() -> Self {
        PrequentialConfig {
            pretrain_size: 200,
            max_samples: 100_000,
            n_wait: 200,
            threshold: 0.5,
            restart_stream: true,
            max_time_secs: None,
            output_file: None,
        }
    }
}

impl PrequentialConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_wait == 0 {
            return Err(SadError::InvalidConfig("n_wait must be at least 1".into()));
        }
        if !self.threshold.is_finite() {
            return Err(SadError::InvalidConfig("threshold must be finite".into()));
        }
        self.max_time()?;
        Ok(())
    }

    /// The wall-clock limit as a `Duration`, rejecting values that are not
    /// positive or do not fit in one.
    pub fn max_time(&self) -> Result<Option<Duration>> {
        let Some(t) = self.max_time_secs else {
            return Ok(None);
        };
        if !(t.is_finite() && t > 0.0) {
            return Err(SadError::InvalidConfig(format!(
                "max_time_secs must be positive, got {t}"
            )));
        }
        Duration::try_from_secs_f64(t)
            .map(Some)
            .map_err(|e| SadError::InvalidConfig(format!("max_time_secs {t}: {e}")))
    }
}

/// Everything needed for one end-to-end run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub dataset: DatasetConfig,
    pub model: HstConfig,
    pub evaluation: PrequentialConfig,
}

impl HarnessConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SadError::io(path, e))?;
        let mut config = Self::from_toml_str(&content)?;
        // Dataset paths are relative to the config file.
        if let (Some(data), Some(dir)) = (config.dataset.path.as_mut(), path.parent()) {
            if data.is_relative() {
                *data = dir.join(&*data);
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_reference_streaming_library() {
        let hst = HstConfig::default();
        assert_eq!(hst.window_size, 250);
        assert_eq!(hst.depth, 15);
        assert_eq!(hst.n_estimators, 25);
        assert_eq!(hst.size_limit, 50);

        let eval = PrequentialConfig::default();
        assert_eq!(eval.pretrain_size, 200);
        assert_eq!(eval.max_samples, 100_000);
        assert!(eval.restart_stream);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = HarnessConfig::from_toml_str(
            r#"
            [dataset]
            orientation = "features_by_samples"

            [model]
            n_features = 3
            random_state = 7

            [evaluation]
            pretrain_size = 250
            max_samples = 1000000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.dataset.orientation, Orientation::FeaturesBySamples);
        assert_eq!(cfg.dataset.features_key, "X");
        assert_eq!(cfg.model.n_features, 3);
        assert_eq!(cfg.model.random_state, Some(7));
        assert_eq!(cfg.model.window_size, 250);
        assert_eq!(cfg.evaluation.pretrain_size, 250);
        assert_eq!(cfg.evaluation.n_wait, 200);
    }

    #[test]
    fn limits_parse_as_pairs() {
        let cfg = HarnessConfig::from_toml_str(
            "[model]\nn_features = 2\nlimits = [[0.0, 1.0], [-5.0, 5.0]]\n",
        )
        .unwrap();
        assert_eq!(cfg.model.limits, Some(vec![(0.0, 1.0), (-5.0, 5.0)]));
        cfg.model.validate().unwrap();
    }

    #[test]
    fn bad_toml_is_reported() {
        let err = HarnessConfig::from_toml_str("[model]\nn_features = \"three\"").unwrap_err();
        assert!(matches!(err, SadError::Toml(_)));
    }

    #[test]
    fn hst_validation() {
        let mut cfg = HstConfig::default();
        assert!(cfg.validate().is_err());
        cfg.n_features = 2;
        cfg.validate().unwrap();
        cfg.limits = Some(vec![(1.0, 0.0), (0.0, 1.0)]);
        assert!(cfg.validate().is_err());
        cfg.limits = Some(vec![(0.0, 1.0)]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn prequential_validation() {
        let mut cfg = PrequentialConfig::default();
        cfg.validate().unwrap();
        cfg.n_wait = 0;
        assert!(cfg.validate().is_err());
        cfg.n_wait = 10;
        cfg.max_time_secs = Some(0.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn max_time_beyond_duration_range_is_rejected() {
        let cfg = PrequentialConfig {
            max_time_secs: Some(1e20),
            ..PrequentialConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(SadError::InvalidConfig(_))));

        let cfg = PrequentialConfig {
            max_time_secs: Some(2.5),
            ..PrequentialConfig::default()
        };
        assert_eq!(cfg.max_time().unwrap(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn dataset_path_resolves_relative_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[dataset]\npath = \"http.json\"").unwrap();
        let cfg = HarnessConfig::from_toml_file(&path).unwrap();
        assert_eq!(cfg.dataset.path, Some(dir.path().join("http.json")));
    }
}
