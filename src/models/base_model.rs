/// A common Rust trait for streaming anomaly models.
///
/// Scores follow the "higher is more anomalous" convention.
pub trait BaseModel {
    /// Incorporate one instance.
    ///
    /// `x` must have [`BaseModel::n_features`] values when the model fixes a
    /// width. Implementations may drop a record that does not, so callers
    /// outside the evaluator should check the width first.
    fn fit_partial(&mut self, x: &[f64]);

    /// Score one instance without changing the model. Models that fix a width
    /// give a record of the wrong width a neutral score.
    fn score_partial(&self, x: &[f64]) -> f64;

    /// Default: score, then learn from the same instance.
    fn fit_score_partial(&mut self, x: &[f64]) -> f64 {
        let score = self.score_partial(x);
        self.fit_partial(x);
        score
    }

    /// Default: fit a batch of instances.
    fn fit(&mut self, xs: &[Vec<f64>]) {
        for x in xs {
            self.fit_partial(x);
        }
    }

    /// Default: score a batch.
    fn score(&self, xs: &[Vec<f64>]) -> Vec<f64> {
        xs.iter().map(|x| self.score_partial(x)).collect()
    }

    /// Default: score-then-fit a batch.
    fn fit_score(&mut self, xs: &[Vec<f64>]) -> Vec<f64> {
        xs.iter().map(|x| self.fit_score_partial(x)).collect()
    }

    /// Expected record width, if the model fixes one.
    fn n_features(&self) -> Option<usize> {
        None
    }
}
