use numpy::{PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::config::{HstConfig, PrequentialConfig};
use crate::error::SadError;
use crate::models::{BaseModel, HalfSpaceTrees};
use crate::stream::{DataStream, Label, Stream};
use crate::utils::EvaluatePrequential;

impl From<SadError> for PyErr {
    fn from(err: SadError) -> PyErr {
        match &err {
            SadError::Io { .. } => PyIOError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// Helper function to convert a 2D array into row vectors
fn rows_to_vec(xs: &PyReadonlyArray2<'_, f64>) -> Vec<Vec<f64>> {
    xs.as_array().rows().into_iter().map(|row| row.to_vec()).collect()
}

fn check_width(expected: usize, found: usize) -> PyResult<()> {
    if expected != found {
        return Err(PyValueError::new_err(format!(
            "expected {expected} features, found {found}"
        )));
    }
    Ok(())
}

/// Python-exposed wrapper around HalfSpaceTrees
#[pyclass(name = "HalfSpaceTrees")]
pub struct PyHalfSpaceTrees {
    inner: HalfSpaceTrees,
    n_features: usize,
}

#[pymethods]
impl PyHalfSpaceTrees {
    #[new]
    #[pyo3(signature = (
        n_features,
        window_size = 250,
        depth = 15,
        n_estimators = 25,
        size_limit = 50,
        random_state = None,
        limits = None,
    ))]
    fn new(
        n_features: usize,
        window_size: usize,
        depth: usize,
        n_estimators: usize,
        size_limit: usize,
        random_state: Option<u64>,
        limits: Option<Vec<(f64, f64)>>,
    ) -> PyResult<Self> {
        let inner = HalfSpaceTrees::new(HstConfig {
            n_features,
            window_size,
            depth,
            n_estimators,
            size_limit,
            random_state,
            limits,
        })?;
        Ok(PyHalfSpaceTrees { inner, n_features })
    }

    fn fit_partial(&mut self, x: PyReadonlyArray1<'_, f64>) -> PyResult<()> {
        let slice = x.as_slice()?;
        check_width(self.n_features, slice.len())?;
        self.inner.fit_partial(slice);
        Ok(())
    }

    fn score_partial(&self, x: PyReadonlyArray1<'_, f64>) -> PyResult<f64> {
        let slice = x.as_slice()?;
        check_width(self.n_features, slice.len())?;
        Ok(self.inner.score_partial(slice))
    }

    fn fit_score_partial(&mut self, x: PyReadonlyArray1<'_, f64>) -> PyResult<f64> {
        let slice = x.as_slice()?;
        check_width(self.n_features, slice.len())?;
        Ok(self.inner.fit_score_partial(slice))
    }

    fn fit(&mut self, xs: PyReadonlyArray2<'_, f64>) -> PyResult<()> {
        check_width(self.n_features, xs.shape()[1])?;
        self.inner.fit(&rows_to_vec(&xs));
        Ok(())
    }

    fn score(&self, xs: PyReadonlyArray2<'_, f64>) -> PyResult<Vec<f64>> {
        check_width(self.n_features, xs.shape()[1])?;
        Ok(self.inner.score(&rows_to_vec(&xs)))
    }

    fn fit_score(&mut self, xs: PyReadonlyArray2<'_, f64>) -> PyResult<Vec<f64>> {
        check_width(self.n_features, xs.shape()[1])?;
        Ok(self.inner.fit_score(&rows_to_vec(&xs)))
    }

    #[getter]
    fn samples_seen(&self) -> usize {
        self.inner.samples_seen()
    }
}

/// Python-exposed wrapper around DataStream
#[pyclass(name = "DataStream")]
pub struct PyDataStream {
    inner: DataStream,
}

#[pymethods]
impl PyDataStream {
    #[new]
    #[pyo3(signature = (x, y = None))]
    fn new(x: PyReadonlyArray2<'_, f64>, y: Option<PyReadonlyArray1<'_, f64>>) -> PyResult<Self> {
        let labels = y
            .map(|y| {
                y.as_array()
                    .iter()
                    .enumerate()
                    .map(|(row, &v)| Label::from_value(v, row))
                    .collect::<crate::Result<Vec<_>>>()
            })
            .transpose()?;
        let inner = DataStream::new(x.as_array().to_owned(), labels)?;
        Ok(PyDataStream { inner })
    }

    fn reset(&mut self) {
        self.inner.reset();
    }

    fn has_more_samples(&self) -> bool {
        self.inner.has_more_samples()
    }

    fn n_remaining_samples(&self) -> usize {
        self.inner.n_remaining_samples()
    }

    #[getter]
    fn n_features(&self) -> usize {
        self.inner.n_features()
    }

    /// Returns `(X, y)` for up to `batch_size` records; `y` holds `None` for
    /// unlabeled streams.
    #[pyo3(signature = (batch_size = 1))]
    fn next_sample(&mut self, batch_size: usize) -> PyResult<(Vec<Vec<f64>>, Vec<Option<u8>>)> {
        let batch = self.inner.next_sample(batch_size)?;
        Ok(batch
            .into_iter()
            .map(|r| {
                let label = r.label().map(|l| u8::from(l.is_anomaly()));
                (r.features().to_vec(), label)
            })
            .unzip())
    }
}

/// Python-exposed wrapper around EvaluatePrequential
#[pyclass(name = "EvaluatePrequential")]
pub struct PyEvaluatePrequential {
    inner: EvaluatePrequential,
}

#[pymethods]
impl PyEvaluatePrequential {
    #[new]
    #[pyo3(signature = (
        pretrain_size = 200,
        max_samples = 100_000,
        n_wait = 200,
        threshold = 0.5,
        restart_stream = true,
        max_time = None,
        output_file = None,
    ))]
    fn new(
        pretrain_size: usize,
        max_samples: usize,
        n_wait: usize,
        threshold: f64,
        restart_stream: bool,
        max_time: Option<f64>,
        output_file: Option<std::path::PathBuf>,
    ) -> PyResult<Self> {
        let inner = EvaluatePrequential::new(PrequentialConfig {
            pretrain_size,
            max_samples,
            n_wait,
            threshold,
            restart_stream,
            max_time_secs: max_time,
            output_file,
        })?;
        Ok(PyEvaluatePrequential { inner })
    }

    /// Run the evaluation and return the result as a dict.
    fn evaluate(
        &self,
        py: Python<'_>,
        mut stream: PyRefMut<'_, PyDataStream>,
        mut model: PyRefMut<'_, PyHalfSpaceTrees>,
    ) -> PyResult<PyObject> {
        let result = self.inner.evaluate(&mut stream.inner, &mut model.inner)?;
        let json = py.import("json")?;
        let dict = json.call_method1("loads", (result.to_json_pretty()?,))?;
        Ok(dict.into())
    }
}

/// A Python module implemented in Rust.
#[pymodule]
fn stream_sad(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyHalfSpaceTrees>()?;
    m.add_class::<PyDataStream>()?;
    m.add_class::<PyEvaluatePrequential>()?;
    Ok(())
}

#[cfg(all(test, feature = "python"))]
mod tests {
    use super::*;
    use numpy::{PyArray1, PyArray2};

    #[test]
    fn classes_build_and_evaluate() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| -> PyResult<()> {
            let rows: Vec<Vec<f64>> = (0..40)
                .map(|i| {
                    let v = if i % 10 == 9 { 0.9 } else { 0.2 + (i % 3) as f64 / 100.0 };
                    vec![v, v]
                })
                .collect();
            let labels: Vec<f64> = (0..40).map(|i| if i % 10 == 9 { 1.0 } else { 0.0 }).collect();

            let x = PyArray2::from_vec2(py, &rows).map_err(|e| PyValueError::new_err(e.to_string()))?;
            let y = PyArray1::from_slice(py, &labels);
            let stream = Py::new(py, PyDataStream::new(x.readonly(), Some(y.readonly()))?)?;

            let model = PyHalfSpaceTrees::new(2, 10, 4, 5, 2, Some(1), None)?;
            assert!(model
                .score_partial(PyArray1::from_slice(py, &[0.1]).readonly())
                .is_err());
            assert_eq!(
                model.score_partial(PyArray1::from_slice(py, &[0.1, 0.1]).readonly())?,
                0.0
            );
            let model = Py::new(py, model)?;

            let evaluator = PyEvaluatePrequential::new(10, 1_000, 10, 0.5, true, None, None)?;
            let result = evaluator.evaluate(py, stream.borrow_mut(py), model.borrow_mut(py))?;
            let result = result.as_ref(py);
            assert_eq!(result.get_item("n_samples")?.extract::<usize>()?, 40);
            assert_eq!(result.get_item("n_scored")?.extract::<usize>()?, 30);
            assert_eq!(result.get_item("stop_reason")?.extract::<String>()?, "exhausted");
            assert_eq!(model.borrow(py).samples_seen(), 40);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn sad_errors_map_to_python_exceptions() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let err: PyErr = SadError::InvalidConfig("n_wait must be at least 1".into()).into();
            assert!(err.is_instance_of::<PyValueError>(py));
            let err: PyErr = SadError::io(
                "/missing/http.json",
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            )
            .into();
            assert!(err.is_instance_of::<PyIOError>(py));
        });
    }
}
