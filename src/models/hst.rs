use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::HstConfig;
use crate::error::Result;
use crate::models::base_model::BaseModel;

/// Node structure for Half-Space Trees
#[derive(Debug, Clone)]
struct HstNode {
    left: Option<Box<HstNode>>,
    right: Option<Box<HstNode>>,
    /// Mass recorded during the last completed window.
    r_mass: usize,
    /// Mass of the window currently being filled.
    l_mass: usize,
    split_att: usize,
    split_value: f64,
    k: usize,
}

impl HstNode {
    fn leaf(k: usize) -> Self {
        HstNode {
            left: None,
            right: None,
            r_mass: 0,
            l_mass: 0,
            split_att: 0,
            split_value: 0.0,
            k,
        }
    }

    fn child_for(&self, x: &[f64]) -> Option<&HstNode> {
        if x[self.split_att] > self.split_value {
            self.right.as_deref()
        } else {
            self.left.as_deref()
        }
    }

    fn child_for_mut(&mut self, x: &[f64]) -> Option<&mut HstNode> {
        if x[self.split_att] > self.split_value {
            self.right.as_deref_mut()
        } else {
            self.left.as_deref_mut()
        }
    }
}

/// Streaming Half-Space Trees (Tan, Ting & Liu, 2011).
///
/// An ensemble of random, data-independent binary trees of fixed height.
/// Each node counts how many records of the current window fell into its
/// half-space (`l_mass`); at every window boundary those counts become the
/// reference profile (`r_mass`) used for scoring. Records landing in
/// sparsely populated regions of the reference profile score high.
#[derive(Debug, Clone)]
pub struct HalfSpaceTrees {
    window_size: usize,
    max_depth: usize,
    size_limit: usize,
    num_dimensions: usize,
    limits: Option<Vec<(f64, f64)>>,
    roots: Vec<HstNode>,
    is_first_window: bool,
    step: usize,
    samples_seen: usize,
    max_score: f64,
    rng: StdRng,
}

impl HalfSpaceTrees {
    pub fn new(config: HstConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.random_state {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let max_score = config.n_estimators as f64
            * config.window_size as f64
            * (2.0_f64.powi(config.depth as i32 + 1) - 1.0);

        let mut instance = HalfSpaceTrees {
            window_size: config.window_size,
            max_depth: config.depth,
            size_limit: config.size_limit,
            num_dimensions: config.n_features,
            limits: config.limits,
            roots: Vec::with_capacity(config.n_estimators),
            is_first_window: true,
            step: 0,
            samples_seen: 0,
            max_score,
            rng,
        };

        for _ in 0..config.n_estimators {
            let (mins, maxes) = instance.work_ranges();
            let root = instance.build_single_hs_tree(mins, maxes, 0);
            instance.roots.push(root);
        }

        Ok(instance)
    }

    /// Per-feature `[min, max]` the tree splits are drawn within.
    ///
    /// Without explicit limits the features are assumed to lie in [0, 1] and
    /// every tree gets its own randomly shifted work space that still covers
    /// the whole unit range.
    fn work_ranges(&mut self) -> (Vec<f64>, Vec<f64>) {
        match &self.limits {
            Some(limits) => limits.iter().copied().unzip(),
            None => (0..self.num_dimensions)
                .map(|_| {
                    let s: f64 = self.rng.gen();
                    let range = 2.0 * s.max(1.0 - s);
                    (s - range, s + range)
                })
                .unzip(),
        }
    }

    fn build_single_hs_tree(&mut self, mut mins: Vec<f64>, mut maxes: Vec<f64>, current_depth: usize) -> HstNode {
        if current_depth == self.max_depth {
            return HstNode::leaf(current_depth);
        }

        let q = self.rng.gen_range(0..self.num_dimensions);
        let p = (maxes[q] + mins[q]) / 2.0;

        let temp = maxes[q];
        maxes[q] = p;
        let left = self.build_single_hs_tree(mins.clone(), maxes.clone(), current_depth + 1);
        maxes[q] = temp;
        mins[q] = p;
        let right = self.build_single_hs_tree(mins, maxes, current_depth + 1);

        HstNode {
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            r_mass: 0,
            l_mass: 0,
            split_att: q,
            split_value: p,
            k: current_depth,
        }
    }

    fn update_mass(x: &[f64], root: &mut HstNode) {
        let mut node = Some(root);
        while let Some(current) = node {
            current.l_mass += 1;
            node = current.child_for_mut(x);
        }
    }

    fn update_model(node: &mut HstNode) {
        node.r_mass = node.l_mass;
        node.l_mass = 0;

        if let Some(ref mut left) = node.left {
            HalfSpaceTrees::update_model(left);
        }

        if let Some(ref mut right) = node.right {
            HalfSpaceTrees::update_model(right);
        }
    }

    /// Mass-weighted depth along the record's path. The walk stops after the
    /// first node whose reference mass is below `size_limit`.
    fn score_tree(&self, x: &[f64], root: &HstNode) -> f64 {
        let mut s = 0.0;
        let mut node = Some(root);
        while let Some(current) = node {
            s += current.r_mass as f64 * 2.0_f64.powi(current.k as i32);
            if current.r_mass < self.size_limit {
                break;
            }
            node = current.child_for(x);
        }
        s
    }

    pub fn samples_seen(&self) -> usize {
        self.samples_seen
    }

    /// Whether a full reference window has been collected yet.
    pub fn is_warm(&self) -> bool {
        !self.is_first_window
    }

    pub fn n_estimators(&self) -> usize {
        self.roots.len()
    }
}

impl BaseModel for HalfSpaceTrees {
    /// A record whose width is not `n_features` is not learned from; it is
    /// logged at warn level and `samples_seen` does not advance.
    fn fit_partial(&mut self, x: &[f64]) {
        if x.len() != self.num_dimensions {
            warn!(
                expected = self.num_dimensions,
                found = x.len(),
                "half-space trees: ignoring record of wrong width"
            );
            return;
        }
        self.samples_seen += 1;
        self.step += 1;

        for root in &mut self.roots {
            HalfSpaceTrees::update_mass(x, root);
        }

        if self.step == self.window_size {
            self.step = 0;
            self.is_first_window = false;
            for root in &mut self.roots {
                HalfSpaceTrees::update_model(root);
            }
            debug!(samples_seen = self.samples_seen, "half-space trees: reference window rotated");
        }
    }

    fn score_partial(&self, x: &[f64]) -> f64 {
        if self.is_first_window || x.len() != self.num_dimensions {
            return 0.0;
        }

        let s: f64 = self.roots.iter().map(|root| self.score_tree(x, root)).sum();
        (1.0 - s / self.max_score).clamp(0.0, 1.0)
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.num_dimensions)
    }
}
