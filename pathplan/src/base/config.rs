// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::f64::consts::PI;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// The kind of degree of freedom a configuration component describes.
///
/// Rotational kinds wrap in `[-PI, PI)` and are treated cyclically by the
/// trajectory discretizers; all other kinds are linear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DofType {
    PlanarPos,
    PlanarRot,
    VolumetricPos,
    VolumetricRot,
    Joint,
    Position,
    Rotation,
}

impl DofType {
    /// Returns `true` for components that represent an angle.
    pub fn is_rotational(&self) -> bool {
        matches!(
            self,
            DofType::PlanarRot | DofType::VolumetricRot | DofType::Joint | DofType::Rotation
        )
    }
}

/// A point in the `D`-dimensional joint space of a robot.
///
/// Configurations are plain value types: `Copy`, componentwise arithmetic and
/// the usual norms. A configuration with a NaN component is the "no sample"
/// sentinel, see [`Config::nan`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config<const D: usize> {
    pub values: [f64; D],
}

impl<const D: usize> Config<D> {
    pub fn new(values: [f64; D]) -> Self {
        Config { values }
    }

    /// A configuration with every component set to `value`.
    pub fn splat(value: f64) -> Self {
        Config { values: [value; D] }
    }

    pub fn zeros() -> Self {
        Self::splat(0.0)
    }

    /// The "no sample" sentinel.
    pub fn nan() -> Self {
        Self::splat(f64::NAN)
    }

    /// Returns `true` if any component is NaN, i.e. this is no usable sample.
    pub fn has_nan(&self) -> bool {
        self.values.iter().any(|v| v.is_nan())
    }

    pub fn dim(&self) -> usize {
        D
    }

    /// Sum of absolute component values.
    pub fn norm_l1(&self) -> f64 {
        self.values.iter().map(|v| v.abs()).sum()
    }

    /// Euclidean norm.
    pub fn norm_l2(&self) -> f64 {
        self.sq_norm().sqrt()
    }

    /// Squared Euclidean norm, cheaper than [`Config::norm_l2`] for
    /// comparisons.
    pub fn sq_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    /// Largest absolute component value.
    pub fn norm_inf(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    pub fn dot(&self, other: &Config<D>) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Componentwise minimum with `other`.
    pub fn min(&self, other: &Config<D>) -> Config<D> {
        let mut values = self.values;
        for (v, o) in values.iter_mut().zip(other.values.iter()) {
            *v = v.min(*o);
        }
        Config { values }
    }

    /// Componentwise maximum with `other`.
    pub fn max(&self, other: &Config<D>) -> Config<D> {
        let mut values = self.values;
        for (v, o) in values.iter_mut().zip(other.values.iter()) {
            *v = v.max(*o);
        }
        Config { values }
    }

    /// Clamps every component into `[min, max]`.
    pub fn clamp(&self, min: &Config<D>, max: &Config<D>) -> Config<D> {
        let mut values = self.values;
        for i in 0..D {
            values[i] = values[i].clamp(min.values[i], max.values[i]);
        }
        Config { values }
    }

    /// Returns `true` if every component lies inside `[min, max]`.
    pub fn inside(&self, min: &Config<D>, max: &Config<D>) -> bool {
        self.values
            .iter()
            .enumerate()
            .all(|(i, v)| *v >= min.values[i] && *v <= max.values[i])
    }
}

/// Normalises an angle into `[-PI, PI)`.
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(2.0 * PI) - PI
}

impl<const D: usize> Default for Config<D> {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<const D: usize> From<[f64; D]> for Config<D> {
    fn from(values: [f64; D]) -> Self {
        Config { values }
    }
}

impl<const D: usize> Index<usize> for Config<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

impl<const D: usize> IndexMut<usize> for Config<D> {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.values[index]
    }
}

impl<const D: usize> Add for Config<D> {
    type Output = Config<D>;

    fn add(self, rhs: Config<D>) -> Config<D> {
        let mut values = self.values;
        for (v, r) in values.iter_mut().zip(rhs.values.iter()) {
            *v += r;
        }
        Config { values }
    }
}

impl<const D: usize> Sub for Config<D> {
    type Output = Config<D>;

    fn sub(self, rhs: Config<D>) -> Config<D> {
        let mut values = self.values;
        for (v, r) in values.iter_mut().zip(rhs.values.iter()) {
            *v -= r;
        }
        Config { values }
    }
}

impl<const D: usize> AddAssign for Config<D> {
    fn add_assign(&mut self, rhs: Config<D>) {
        for (v, r) in self.values.iter_mut().zip(rhs.values.iter()) {
            *v += r;
        }
    }
}

impl<const D: usize> SubAssign for Config<D> {
    fn sub_assign(&mut self, rhs: Config<D>) {
        for (v, r) in self.values.iter_mut().zip(rhs.values.iter()) {
            *v -= r;
        }
    }
}

impl<const D: usize> Mul<f64> for Config<D> {
    type Output = Config<D>;

    fn mul(self, rhs: f64) -> Config<D> {
        let mut values = self.values;
        for v in values.iter_mut() {
            *v *= rhs;
        }
        Config { values }
    }
}

impl<const D: usize> Div<f64> for Config<D> {
    type Output = Config<D>;

    fn div(self, rhs: f64) -> Config<D> {
        let mut values = self.values;
        for v in values.iter_mut() {
            *v /= rhs;
        }
        Config { values }
    }
}
