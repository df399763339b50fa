// Copyright (c) 2025 the pathplan contributors
//
// SPDX-License-Identifier: BSD-3-Clause

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};

use crate::base::Config;
use crate::metric::DistanceMetric;

/// Produces one configuration per call, inside the robot's joint box.
///
/// Samplers are deterministic given their seed: two samplers constructed with
/// equal seeds produce identical sequences. Each expansion worker owns its
/// own sampler, created through [`Sampler::fork`] with a decorrelated stream
/// index, so parallel runs never share mutable state.
pub trait Sampler<const D: usize>: Send {
    /// Draws the next configuration.
    fn sample(&mut self) -> Config<D>;

    /// Moves the distribution origin, where the variant has one.
    fn set_origin(&mut self, _origin: &Config<D>) {}

    /// An identically configured sampler on a derived seed stream.
    fn fork(&self, stream: u64) -> Box<dyn Sampler<D>>;

    /// A uniform random number in `[0, 1)`.
    fn random(&mut self) -> f64;

    /// A standard-normal random number.
    fn random_normal(&mut self) -> f64;

    /// A uniformly distributed unit direction.
    fn random_ray(&mut self) -> Config<D>;
}

/// Hashes a seed string into a sampler seed. `DefaultHasher::new()` uses
/// fixed keys, so the mapping is stable across runs.
pub fn seed_from_str(seed: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    hasher.finish()
}

/// splitmix64 step, used to derive decorrelated per-worker seed streams.
pub fn derive_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn uniform_component(rng: &mut StdRng, lower: f64, upper: f64) -> f64 {
    if lower < upper {
        rng.random_range(lower..upper)
    } else {
        lower
    }
}

fn unit_ray<const D: usize>(rng: &mut StdRng) -> Config<D> {
    let mut ray = Config::zeros();
    for v in ray.values.iter_mut() {
        *v = rng.sample(StandardNormal);
    }
    let norm = ray.norm_l2();
    if norm < 1e-12 {
        let mut fallback = Config::zeros();
        fallback[0] = 1.0;
        return fallback;
    }
    ray / norm
}

/// Uniform sampling over the joint box.
pub struct UniformSampler<const D: usize> {
    min: Config<D>,
    max: Config<D>,
    seed: u64,
    rng: StdRng,
}

impl<const D: usize> UniformSampler<D> {
    pub fn new(min: Config<D>, max: Config<D>, seed: u64) -> Self {
        UniformSampler {
            min,
            max,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<const D: usize> Sampler<D> for UniformSampler<D> {
    fn sample(&mut self) -> Config<D> {
        let mut config = Config::zeros();
        for i in 0..D {
            config[i] = uniform_component(&mut self.rng, self.min[i], self.max[i]);
        }
        config
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampler<D>> {
        Box::new(UniformSampler::new(
            self.min,
            self.max,
            derive_seed(self.seed, stream),
        ))
    }

    fn random(&mut self) -> f64 {
        self.rng.random()
    }

    fn random_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn random_ray(&mut self) -> Config<D> {
        unit_ray(&mut self.rng)
    }
}

/// Uniform sampling where a fixed fraction of draws comes from a narrow box
/// around a configurable origin.
pub struct UniformBiasedSampler<const D: usize> {
    min: Config<D>,
    max: Config<D>,
    origin: Config<D>,
    bias: f64,
    /// Half-width of the biased box as a fraction of the component range.
    focus: f64,
    seed: u64,
    rng: StdRng,
}

impl<const D: usize> UniformBiasedSampler<D> {
    pub fn new(min: Config<D>, max: Config<D>, bias: f64, seed: u64) -> Self {
        let origin = (min + max) / 2.0;
        UniformBiasedSampler {
            min,
            max,
            origin,
            bias: bias.clamp(0.0, 1.0),
            focus: 0.05,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<const D: usize> Sampler<D> for UniformBiasedSampler<D> {
    fn sample(&mut self) -> Config<D> {
        let biased = self.rng.random_bool(self.bias);
        let mut config = Config::zeros();
        for i in 0..D {
            let (lower, upper) = if biased {
                let half_width = (self.max[i] - self.min[i]) * self.focus;
                (
                    (self.origin[i] - half_width).max(self.min[i]),
                    (self.origin[i] + half_width).min(self.max[i]),
                )
            } else {
                (self.min[i], self.max[i])
            };
            config[i] = uniform_component(&mut self.rng, lower, upper);
        }
        config
    }

    fn set_origin(&mut self, origin: &Config<D>) {
        self.origin = *origin;
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampler<D>> {
        let mut sampler =
            UniformBiasedSampler::new(self.min, self.max, self.bias, derive_seed(self.seed, stream));
        sampler.origin = self.origin;
        sampler.focus = self.focus;
        Box::new(sampler)
    }

    fn random(&mut self) -> f64 {
        self.rng.random()
    }

    fn random_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn random_ray(&mut self) -> Config<D> {
        unit_ray(&mut self.rng)
    }
}

/// Per-component normal distribution with the mean at the origin and a
/// standard deviation equal to the component range.
pub struct NormalSampler<const D: usize> {
    min: Config<D>,
    max: Config<D>,
    origin: Config<D>,
    seed: u64,
    rng: StdRng,
}

impl<const D: usize> NormalSampler<D> {
    pub fn new(min: Config<D>, max: Config<D>, seed: u64) -> Self {
        let origin = (min + max) / 2.0;
        NormalSampler {
            min,
            max,
            origin,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<const D: usize> Sampler<D> for NormalSampler<D> {
    fn sample(&mut self) -> Config<D> {
        let mut config = Config::zeros();
        for i in 0..D {
            let range = self.max[i] - self.min[i];
            if range <= 0.0 {
                config[i] = self.min[i];
                continue;
            }
            let normal = Normal::new(self.origin[i], range).expect("finite std deviation");
            let mut value = normal.sample(&mut self.rng);
            for _ in 0..8 {
                if value >= self.min[i] && value <= self.max[i] {
                    break;
                }
                value = normal.sample(&mut self.rng);
            }
            config[i] = value.clamp(self.min[i], self.max[i]);
        }
        config
    }

    fn set_origin(&mut self, origin: &Config<D>) {
        self.origin = *origin;
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampler<D>> {
        let mut sampler = NormalSampler::new(self.min, self.max, derive_seed(self.seed, stream));
        sampler.origin = self.origin;
        Box::new(sampler)
    }

    fn random(&mut self) -> f64 {
        self.rng.random()
    }

    fn random_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn random_ray(&mut self) -> Config<D> {
        unit_ray(&mut self.rng)
    }
}

/// Low-discrepancy Halton sequence with one prime base per axis.
pub struct HaltonSampler<const D: usize> {
    min: Config<D>,
    max: Config<D>,
    bases: [u64; D],
    index: u64,
    rng: StdRng,
    seed: u64,
}

impl<const D: usize> HaltonSampler<D> {
    pub fn new(min: Config<D>, max: Config<D>, seed: u64) -> Self {
        HaltonSampler {
            min,
            max,
            bases: first_primes(),
            index: 1,
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    fn radical_inverse(mut index: u64, base: u64) -> f64 {
        let mut result = 0.0;
        let mut fraction = 1.0 / base as f64;
        while index > 0 {
            result += (index % base) as f64 * fraction;
            index /= base;
            fraction /= base as f64;
        }
        result
    }
}

fn first_primes<const D: usize>() -> [u64; D] {
    let mut primes = [0u64; D];
    let mut candidate = 2u64;
    let mut found = 0;
    while found < D {
        if (2..candidate).all(|d| d * d > candidate || candidate % d != 0) {
            primes[found] = candidate;
            found += 1;
        }
        candidate += 1;
    }
    primes
}

impl<const D: usize> Sampler<D> for HaltonSampler<D> {
    fn sample(&mut self) -> Config<D> {
        let mut config = Config::zeros();
        for i in 0..D {
            let t = Self::radical_inverse(self.index, self.bases[i]);
            config[i] = self.min[i] + t * (self.max[i] - self.min[i]);
        }
        self.index += 1;
        config
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampler<D>> {
        let mut sampler = HaltonSampler::new(self.min, self.max, derive_seed(self.seed, stream));
        // Leap ahead so forked streams do not replay the same subsequence.
        sampler.index = self.index + stream.wrapping_mul(7919) % 1_000_003;
        Box::new(sampler)
    }

    fn random(&mut self) -> f64 {
        self.rng.random()
    }

    fn random_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn random_ray(&mut self) -> Config<D> {
        unit_ray(&mut self.rng)
    }
}

/// Cycles through a regular grid over the joint box.
pub struct GridSampler<const D: usize> {
    min: Config<D>,
    max: Config<D>,
    points_per_axis: u64,
    counter: u64,
    rng: StdRng,
    seed: u64,
}

impl<const D: usize> GridSampler<D> {
    pub fn new(min: Config<D>, max: Config<D>, points_per_axis: usize, seed: u64) -> Self {
        GridSampler {
            min,
            max,
            points_per_axis: points_per_axis.max(1) as u64,
            counter: 0,
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    fn total(&self) -> u64 {
        self.points_per_axis.saturating_pow(D as u32)
    }
}

impl<const D: usize> Sampler<D> for GridSampler<D> {
    fn sample(&mut self) -> Config<D> {
        let mut index = self.counter;
        self.counter = (self.counter + 1) % self.total();

        let mut config = Config::zeros();
        for i in 0..D {
            let cell = index % self.points_per_axis;
            index /= self.points_per_axis;
            let step = (self.max[i] - self.min[i]) / self.points_per_axis as f64;
            config[i] = self.min[i] + (cell as f64 + 0.5) * step;
        }
        config
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampler<D>> {
        let mut sampler = GridSampler::new(
            self.min,
            self.max,
            self.points_per_axis as usize,
            derive_seed(self.seed, stream),
        );
        sampler.counter = stream % self.total();
        Box::new(sampler)
    }

    fn random(&mut self) -> f64 {
        self.rng.random()
    }

    fn random_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn random_ray(&mut self) -> Config<D> {
        unit_ray(&mut self.rng)
    }
}

/// Informed sampler: uniform over the prolate hyperspheroid with foci at the
/// start and goal and a major axis equal to the best known path cost.
///
/// Until [`EllipsoidSampler::set_params`] is called (or when the best cost
/// does not exceed the focal distance) it falls back to uniform sampling.
pub struct EllipsoidSampler<const D: usize> {
    min: Config<D>,
    max: Config<D>,
    params: Option<EllipsoidParams<D>>,
    seed: u64,
    rng: StdRng,
}

struct EllipsoidParams<const D: usize> {
    center: Config<D>,
    /// Orthonormal basis whose first vector points from start to goal.
    basis: Vec<Config<D>>,
    focal_dist: f64,
    best_cost: f64,
}

impl<const D: usize> EllipsoidSampler<D> {
    pub fn new(min: Config<D>, max: Config<D>, seed: u64) -> Self {
        EllipsoidSampler {
            min,
            max,
            params: None,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Re-centres the spheroid on the current problem: foci at `start` and
    /// `goal`, major axis `best_cost`.
    pub fn set_params(
        &mut self,
        start: &Config<D>,
        goal: &Config<D>,
        best_cost: f64,
        metric: &dyn DistanceMetric<D>,
    ) {
        let focal_dist = metric.dist(start, goal);
        if focal_dist <= 0.0 || !best_cost.is_finite() || best_cost <= focal_dist {
            self.params = None;
            return;
        }

        let direction = (*goal - *start) / (*goal - *start).norm_l2();
        let mut basis = vec![direction];
        for axis in 0..D {
            let mut candidate = Config::zeros();
            candidate[axis] = 1.0;
            for existing in &basis {
                candidate -= *existing * candidate.dot(existing);
            }
            let norm = candidate.norm_l2();
            if norm > 1e-9 {
                basis.push(candidate / norm);
            }
            if basis.len() == D {
                break;
            }
        }

        self.params = Some(EllipsoidParams {
            center: (*start + *goal) / 2.0,
            basis,
            focal_dist,
            best_cost,
        });
    }
}

impl<const D: usize> Sampler<D> for EllipsoidSampler<D> {
    fn sample(&mut self) -> Config<D> {
        let Some(params) = &self.params else {
            let mut config = Config::zeros();
            for i in 0..D {
                config[i] = uniform_component(&mut self.rng, self.min[i], self.max[i]);
            }
            return config;
        };

        // Uniform point in the unit ball.
        let mut ball = unit_ray::<D>(&mut self.rng);
        let radius: f64 = self.rng.random::<f64>().powf(1.0 / D as f64);
        ball = ball * radius;

        let major = params.best_cost / 2.0;
        let minor =
            (params.best_cost * params.best_cost - params.focal_dist * params.focal_dist).sqrt()
                / 2.0;

        let mut config = params.center;
        for (i, axis) in params.basis.iter().enumerate() {
            let scale = if i == 0 { major } else { minor };
            config += *axis * (ball[i] * scale);
        }
        config.clamp(&self.min, &self.max)
    }

    fn fork(&self, stream: u64) -> Box<dyn Sampler<D>> {
        let mut sampler = EllipsoidSampler::new(self.min, self.max, derive_seed(self.seed, stream));
        sampler.params = self.params.as_ref().map(|p| EllipsoidParams {
            center: p.center,
            basis: p.basis.clone(),
            focal_dist: p.focal_dist,
            best_cost: p.best_cost,
        });
        Box::new(sampler)
    }

    fn random(&mut self) -> f64 {
        self.rng.random()
    }

    fn random_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }

    fn random_ray(&mut self) -> Config<D> {
        unit_ray(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::L2Metric;

    fn bounds() -> (Config<2>, Config<2>) {
        (Config::new([0.0, -1.0]), Config::new([10.0, 1.0]))
    }

    #[test]
    fn test_uniform_stays_in_bounds_and_is_deterministic() {
        let (min, max) = bounds();
        let mut a = UniformSampler::new(min, max, seed_from_str("unit1"));
        let mut b = UniformSampler::new(min, max, seed_from_str("unit1"));
        for _ in 0..100 {
            let sample = a.sample();
            assert!(sample.inside(&min, &max));
            assert_eq!(sample, b.sample());
        }
    }

    #[test]
    fn test_forked_streams_differ() {
        let (min, max) = bounds();
        let base = UniformSampler::new(min, max, 42);
        let mut fork_a = base.fork(0);
        let mut fork_b = base.fork(1);
        let differs = (0..10).any(|_| fork_a.sample() != fork_b.sample());
        assert!(differs);
    }

    #[test]
    fn test_biased_sampler_concentrates_on_origin() {
        let (min, max) = bounds();
        let mut sampler = UniformBiasedSampler::new(min, max, 1.0, 7);
        let origin = Config::new([2.0, 0.0]);
        sampler.set_origin(&origin);
        for _ in 0..50 {
            let sample = sampler.sample();
            assert!((sample[0] - origin[0]).abs() <= 0.5 + 1e-9);
            assert!((sample[1] - origin[1]).abs() <= 0.1 + 1e-9);
        }
    }

    #[test]
    fn test_normal_sampler_in_bounds() {
        let (min, max) = bounds();
        let mut sampler = NormalSampler::new(min, max, 3);
        for _ in 0..100 {
            assert!(sampler.sample().inside(&min, &max));
        }
    }

    #[test]
    fn test_halton_covers_box_deterministically() {
        let (min, max) = bounds();
        let mut a = HaltonSampler::new(min, max, 1);
        let mut b = HaltonSampler::new(min, max, 99);
        // The Halton sequence ignores the seed for its point set.
        for _ in 0..32 {
            let sample = a.sample();
            assert!(sample.inside(&min, &max));
            assert_eq!(sample, b.sample());
        }
    }

    #[test]
    fn test_grid_cycles() {
        let (min, max) = bounds();
        let mut sampler = GridSampler::new(min, max, 2, 0);
        let first: Vec<Config<2>> = (0..4).map(|_| sampler.sample()).collect();
        let second: Vec<Config<2>> = (0..4).map(|_| sampler.sample()).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|s| s.inside(&min, &max)));
    }

    #[test]
    fn test_ellipsoid_contains_samples_between_foci() {
        let (min, max) = bounds();
        let mut sampler = EllipsoidSampler::new(min, max, 11);
        let start = Config::new([1.0, 0.0]);
        let goal = Config::new([9.0, 0.0]);
        let best_cost = 10.0;
        sampler.set_params(&start, &goal, best_cost, &L2Metric);
        for _ in 0..200 {
            let sample = sampler.sample();
            assert!(sample.inside(&min, &max));
            let through = L2Metric.dist(&start, &sample) + L2Metric.dist(&sample, &goal);
            assert!(through <= best_cost + 1e-6);
        }
    }
}
