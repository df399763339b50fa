// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::base::Config;

/// A distance function over pairs of configurations.
///
/// Contract: `dist(a, b) >= 0`, `dist(a, a) == 0` and
/// `dist(a, b) == dist(b, a)`. Implementations are pure and carry no mutable
/// state, so one instance can be shared across worker threads.
///
/// `simple_dist` returns a monotone transform of `dist` that may skip costly
/// steps (the Euclidean metric skips the square root) and is the currency of
/// the inner comparison loops; `simplify_dist` maps a user-facing distance
/// into that space.
pub trait DistanceMetric<const D: usize>: Send + Sync {
    fn dist(&self, source: &Config<D>, target: &Config<D>) -> f64;

    /// Comparison-only distance, a monotone transform of [`dist`].
    ///
    /// [`dist`]: DistanceMetric::dist
    fn simple_dist(&self, source: &Config<D>, target: &Config<D>) -> f64 {
        self.dist(source, target)
    }

    /// Maps a distance into the [`simple_dist`] comparison space.
    ///
    /// [`simple_dist`]: DistanceMetric::simple_dist
    fn simplify_dist(&self, dist: f64) -> f64 {
        dist
    }

    /// Distance contributed by a gap of `delta` on a single axis, used for
    /// branch pruning in the neighbor search. Must never overestimate the
    /// metric distance between configurations separated by `delta` on `axis`.
    fn axis_dist(&self, _axis: usize, delta: f64) -> f64 {
        delta.abs()
    }
}

/// Manhattan distance.
pub struct L1Metric;

impl<const D: usize> DistanceMetric<D> for L1Metric {
    fn dist(&self, source: &Config<D>, target: &Config<D>) -> f64 {
        (*source - *target).norm_l1()
    }
}

/// Euclidean distance. `simple_dist` is the squared norm.
pub struct L2Metric;

impl<const D: usize> DistanceMetric<D> for L2Metric {
    fn dist(&self, source: &Config<D>, target: &Config<D>) -> f64 {
        (*source - *target).norm_l2()
    }

    fn simple_dist(&self, source: &Config<D>, target: &Config<D>) -> f64 {
        (*source - *target).sq_norm()
    }

    fn simplify_dist(&self, dist: f64) -> f64 {
        dist * dist
    }
}

/// Maximum-coefficient (Chebyshev) distance.
pub struct InfMetric;

impl<const D: usize> DistanceMetric<D> for InfMetric {
    fn dist(&self, source: &Config<D>, target: &Config<D>) -> f64 {
        (*source - *target).norm_inf()
    }
}

/// Manhattan distance with a per-axis weight vector.
pub struct WeightedL1Metric<const D: usize> {
    weights: Config<D>,
}

impl<const D: usize> WeightedL1Metric<D> {
    pub fn new(weights: Config<D>) -> Self {
        WeightedL1Metric { weights }
    }
}

impl<const D: usize> DistanceMetric<D> for WeightedL1Metric<D> {
    fn dist(&self, source: &Config<D>, target: &Config<D>) -> f64 {
        source
            .values
            .iter()
            .zip(target.values.iter())
            .zip(self.weights.values.iter())
            .map(|((s, t), w)| (s - t).abs() * w)
            .sum()
    }

    fn axis_dist(&self, axis: usize, delta: f64) -> f64 {
        delta.abs() * self.weights[axis]
    }
}

/// Euclidean distance with a per-axis weight vector.
pub struct WeightedL2Metric<const D: usize> {
    weights: Config<D>,
}

impl<const D: usize> WeightedL2Metric<D> {
    pub fn new(weights: Config<D>) -> Self {
        WeightedL2Metric { weights }
    }
}

impl<const D: usize> DistanceMetric<D> for WeightedL2Metric<D> {
    fn dist(&self, source: &Config<D>, target: &Config<D>) -> f64 {
        self.simple_dist(source, target).sqrt()
    }

    fn simple_dist(&self, source: &Config<D>, target: &Config<D>) -> f64 {
        source
            .values
            .iter()
            .zip(target.values.iter())
            .zip(self.weights.values.iter())
            .map(|((s, t), w)| {
                let d = (s - t) * w;
                d * d
            })
            .sum()
    }

    fn simplify_dist(&self, dist: f64) -> f64 {
        dist * dist
    }

    fn axis_dist(&self, axis: usize, delta: f64) -> f64 {
        delta.abs() * self.weights[axis]
    }
}

/// Maximum-coefficient distance with a per-axis weight vector.
pub struct WeightedInfMetric<const D: usize> {
    weights: Config<D>,
}

impl<const D: usize> WeightedInfMetric<D> {
    pub fn new(weights: Config<D>) -> Self {
        WeightedInfMetric { weights }
    }
}

impl<const D: usize> DistanceMetric<D> for WeightedInfMetric<D> {
    fn dist(&self, source: &Config<D>, target: &Config<D>) -> f64 {
        source
            .values
            .iter()
            .zip(target.values.iter())
            .zip(self.weights.values.iter())
            .fold(0.0_f64, |acc, ((s, t), w)| acc.max((s - t).abs() * w))
    }

    fn axis_dist(&self, axis: usize, delta: f64) -> f64 {
        delta.abs() * self.weights[axis]
    }
}
